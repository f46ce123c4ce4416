use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    assistant::Assistant,
    error::AssistantError,
    format::format_timestamp,
    types::{Annotation, ChatTurn, VideoDescriptor, VideoSelection},
};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}: set {env_var}")]
    MissingApiKey {
        provider_name: String,
        env_var: String,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    #[default]
    Grok,
    Openai,
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-5.1",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-3-pro",
                env_var: "GEMINI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String, ProviderError> {
        let config = self.config();
        std::env::var(config.env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider_name: self.name().to_string(),
                env_var: config.env_var.to_string(),
            })
    }
}

static KEYPOINTS_PROMPT: &str = r#"
  You are a video learning assistant.

  INPUT: Name, description and URL of a video the user is watching.

  TASK: Derive navigable keypoints, the moments a learner would want to jump to.

  OUTPUT: Return ONLY valid JSON array:
  [
    {
      "timestamp": "HH:MM:SS",
      "title": "Short keypoint title",
      "description": "One sentence explaining what happens at this moment"
    }
  ]

  RULES:
  - 3-10 keypoints, ordered by timestamp
  - Timestamps use two digits per field, e.g. 00:03:28
  - Output ONLY JSON, nothing else
"#;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Assistant backed by an OpenAI-compatible chat completions endpoint.
pub struct ProviderAssistant {
    provider: Provider,
    client: reqwest::Client,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct KeypointPayload {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    start_seconds: Option<f64>,
    title: String,
    #[serde(default)]
    description: String,
}

impl ProviderAssistant {
    pub fn new(provider: Provider) -> Result<Self, AssistantError> {
        Self::with_timeout(provider, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(provider: Provider, timeout: Duration) -> Result<Self, AssistantError> {
        provider.validate_api_key()?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            provider,
            client,
            temperature: 0.3,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, messages: Vec<serde_json::Value>) -> Result<String, AssistantError> {
        let config = self.provider.config();
        let api_key = self.provider.validate_api_key()?;
        debug!(
            provider = self.provider.name(),
            messages = messages.len(),
            "chat completion request"
        );

        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({
                "model": config.model,
                "messages": messages,
                "temperature": self.temperature,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        completion_content(&response)
    }
}

#[async_trait]
impl Assistant for ProviderAssistant {
    /// Any selection is accepted once an API key is configured.
    async fn select_video(&self, selection: &VideoSelection) -> Result<(), AssistantError> {
        self.provider.validate_api_key()?;
        debug!(url = ?selection.source_url, "video accepted");
        Ok(())
    }

    async fn generate_keypoints(
        &self,
        video: &VideoDescriptor,
    ) -> Result<Vec<Annotation>, AssistantError> {
        let content = self
            .complete(vec![
                serde_json::json!({ "role": "system", "content": KEYPOINTS_PROMPT }),
                serde_json::json!({ "role": "user", "content": describe_video(video) }),
            ])
            .await?;

        parse_keypoints(&content)
    }

    async fn send_chat_turn(
        &self,
        video: &VideoDescriptor,
        transcript: &[ChatTurn],
        content: &str,
    ) -> Result<String, AssistantError> {
        let system_prompt = format!(
            "You are a learning assistant answering questions about a video the user is watching.\n\
             Explain unclear parts, give deeper analysis and point to related resources.\n\n{}",
            describe_video(video)
        );

        let mut messages = Vec::with_capacity(transcript.len() + 2);
        messages.push(serde_json::json!({ "role": "system", "content": system_prompt }));
        for turn in transcript {
            messages.push(serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": content }));

        let reply = self.complete(messages).await?;
        if reply.trim().is_empty() {
            return Err(AssistantError::EmptyReply);
        }
        Ok(reply)
    }
}

fn describe_video(video: &VideoDescriptor) -> String {
    format!(
        "Video name: {}\nVideo description: {}\nVideo URL: {}",
        video.name.as_deref().unwrap_or("(not provided)"),
        video.description.as_deref().unwrap_or("(not provided)"),
        video.source_url().unwrap_or(video.canonical_url()),
    )
}

fn completion_content(response: &serde_json::Value) -> Result<String, AssistantError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AssistantError::InvalidResponse {
            reason: format!("Invalid API response structure: {:?}", response),
        })
}

/// Strip a surrounding markdown code fence, if any.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_keypoints(content: &str) -> Result<Vec<Annotation>, AssistantError> {
    let payload: Vec<KeypointPayload> = serde_json::from_str(extract_json(content))?;

    let keypoints = payload
        .into_iter()
        .filter_map(|item| {
            if item.title.trim().is_empty() {
                warn!("dropping keypoint without title");
                return None;
            }
            let timestamp = item
                .timestamp
                .filter(|t| !t.trim().is_empty())
                .or_else(|| item.start_seconds.map(format_timestamp))
                .unwrap_or_else(|| format_timestamp(0.0));
            Some(Annotation::new(timestamp, item.title, item.description))
        })
        .collect();

    Ok(keypoints)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn reads_chat_completion_content() {
        let response = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Sure." } }]
        });
        assert_eq!(completion_content(&response).unwrap(), "Sure.");

        let broken = serde_json::json!({ "error": "nope" });
        assert_matches!(
            completion_content(&broken),
            Err(AssistantError::InvalidResponse { .. })
        );
    }

    #[test]
    fn parses_fenced_keypoints_in_returned_order() {
        let content = r#"```json
        [
          {"timestamp": "00:03:28", "title": "Fit", "description": "Meaning of fit"},
          {"start_seconds": 15.0, "title": "Intro", "description": "Slow German"},
          {"timestamp": "00:05:00", "title": "  ", "description": "dropped"}
        ]
        ```"#;

        let keypoints = parse_keypoints(content).unwrap();
        assert_eq!(
            keypoints,
            vec![
                Annotation::new("00:03:28", "Fit", "Meaning of fit"),
                Annotation::new("00:00:15", "Intro", "Slow German"),
            ]
        );
    }

    #[test]
    fn rejects_non_json_keypoints() {
        assert_matches!(parse_keypoints("no keypoints today"), Err(AssistantError::Json(_)));
    }

    #[test]
    fn provider_names_match_configs() {
        assert_eq!(Provider::default(), Provider::Grok);
        assert_eq!(Provider::Openai.config().env_var, "OPENAI_API_KEY");
        assert_eq!(Provider::Gemini.name(), "Gemini");
    }
}
