use async_trait::async_trait;

use crate::{
    error::AssistantError,
    types::{Annotation, ChatTurn, VideoDescriptor, VideoSelection},
};

/// Backend the session talks to for everything that takes time.
#[async_trait]
pub trait Assistant: Send + Sync + 'static {
    /// Confirm the selected video can be used (ingestion step).
    async fn select_video(&self, selection: &VideoSelection) -> Result<(), AssistantError>;

    /// Keypoints for the video, in the order they should be listed.
    async fn generate_keypoints(
        &self,
        video: &VideoDescriptor,
    ) -> Result<Vec<Annotation>, AssistantError>;

    /// Reply to `content`, given the turns that preceded it.
    async fn send_chat_turn(
        &self,
        video: &VideoDescriptor,
        transcript: &[ChatTurn],
        content: &str,
    ) -> Result<String, AssistantError>;
}
