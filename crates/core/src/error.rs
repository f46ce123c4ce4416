use thiserror::Error;
use tokio::task::JoinError;

use crate::{guard::OperationKind, provider::ProviderError};

/// User input that cannot be accepted. Never mutates session state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter the {field}")]
    Missing { field: &'static str },

    #[error("Please enter a valid URL ({reason}): {value}")]
    MalformedUrl { value: String, reason: String },

    #[error("Timestamp must look like HH:MM:SS, got {value:?}")]
    MalformedTimestamp { value: String },
}

impl ValidationError {
    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field } => field,
            ValidationError::MalformedUrl { .. } => "source_url",
            ValidationError::MalformedTimestamp { .. } => "timestamp",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} is already in progress")]
    Rejected { kind: OperationKind },
}

/// Failure reported by an assistant backend.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid API response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Assistant returned an empty reply")]
    EmptyReply,

    #[error("Video was not accepted: {reason}")]
    Rejected { reason: String },

    #[error("Assistant call aborted: {reason}")]
    Aborted { reason: String },
}

impl From<JoinError> for AssistantError {
    fn from(err: JoinError) -> Self {
        let reason = if err.is_panic() {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned());
            match message {
                Some(message) => format!("panicked: {message}"),
                None => "panicked".to_string(),
            }
        } else {
            "cancelled".to_string()
        };
        AssistantError::Aborted { reason }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn crash() -> String {
        panic!("model crashed")
    }

    #[tokio::test]
    async fn panic_message_becomes_the_reason() {
        let err = tokio::spawn(crash()).await.unwrap_err();
        let err = AssistantError::from(err);

        assert_matches!(
            &err,
            AssistantError::Aborted { reason } if reason == "panicked: model crashed"
        );
        assert_eq!(err.to_string(), "Assistant call aborted: panicked: model crashed");
    }
}
