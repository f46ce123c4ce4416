use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, format::parse_timestamp};

/// How strictly personal-note timestamps are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampRule {
    /// Any non-empty text.
    #[default]
    FreeText,
    /// `HH:MM:SS` with minutes and seconds below 60.
    Clock,
}

impl TimestampRule {
    pub fn check(&self, value: &str) -> Result<(), ValidationError> {
        match self {
            TimestampRule::FreeText => Ok(()),
            TimestampRule::Clock => parse_timestamp(value.trim()).map(|_| ()).ok_or_else(|| {
                ValidationError::MalformedTimestamp {
                    value: value.to_string(),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub timestamp_rule: TimestampRule,
}

impl SessionConfig {
    pub fn with_timestamp_rule(mut self, rule: TimestampRule) -> Self {
        self.timestamp_rule = rule;
        self
    }
}
