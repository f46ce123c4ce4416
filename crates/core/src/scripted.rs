use std::time::Duration;

use async_trait::async_trait;

use crate::{
    assistant::Assistant,
    error::AssistantError,
    types::{Annotation, ChatTurn, VideoDescriptor, VideoSelection},
};

pub const DEFAULT_REPLY: &str = "Hello! How may I help you?";

/// Offline assistant with canned answers and a fixed delay.
#[derive(Debug, Clone)]
pub struct ScriptedAssistant {
    latency: Duration,
    keypoints: Vec<Annotation>,
    reply: String,
}

impl ScriptedAssistant {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            keypoints: demo_keypoints(),
            reply: DEFAULT_REPLY.to_string(),
        }
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Annotation>) -> Self {
        self.keypoints = keypoints;
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn select_video(&self, _selection: &VideoSelection) -> Result<(), AssistantError> {
        self.wait().await;
        Ok(())
    }

    async fn generate_keypoints(
        &self,
        _video: &VideoDescriptor,
    ) -> Result<Vec<Annotation>, AssistantError> {
        self.wait().await;
        Ok(self.keypoints.clone())
    }

    async fn send_chat_turn(
        &self,
        _video: &VideoDescriptor,
        _transcript: &[ChatTurn],
        _content: &str,
    ) -> Result<String, AssistantError> {
        self.wait().await;
        Ok(self.reply.clone())
    }
}

fn demo_keypoints() -> Vec<Annotation> {
    vec![
        Annotation::new(
            "00:00:15",
            "Slow German Practice",
            "Prefers slow German for better thinking and avoiding mistakes.",
        ),
        Annotation::new(
            "00:01:38",
            "Sparkling Water Preference",
            "In Germany it's common to drink carbonated water; speaker prefers it.",
        ),
        Annotation::new(
            "00:03:28",
            "Understanding \"Fit\"",
            "Fit in German can mean healthy, unlike the English usage about fitness.",
        ),
        Annotation::new(
            "00:04:12",
            "Common Mistakes",
            "Speaker highlights common errors learners make.",
        ),
        Annotation::new(
            "00:06:45",
            "Learning Speed",
            "Discusses why learning slow is sometimes better.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_with_canned_content() {
        let assistant = ScriptedAssistant::default();
        let video = VideoDescriptor::default();

        let keypoints = assistant.generate_keypoints(&video).await.unwrap();
        assert_eq!(keypoints.len(), 5);
        assert_eq!(keypoints[0].timestamp, "00:00:15");

        let reply = assistant.send_chat_turn(&video, &[], "hi").await.unwrap();
        assert_eq!(reply, DEFAULT_REPLY);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_configured_latency() {
        let assistant = ScriptedAssistant::new(Duration::from_millis(1500));
        let started = tokio::time::Instant::now();
        assistant
            .select_video(&VideoSelection::from_url("https://youtu.be/x"))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }
}
