use serde::{Deserialize, Serialize};

use crate::embed;

/// What the user typed into the "select video" form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSelection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
}

impl VideoSelection {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    source_url: Option<String>,
    canonical_url: String,
}

impl VideoDescriptor {
    pub fn new(selection: VideoSelection) -> Self {
        let canonical_url = embed::normalize(selection.source_url.as_deref());
        Self {
            name: selection.name,
            description: selection.description,
            source_url: selection.source_url,
            canonical_url,
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Directly embeddable reference, never empty.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    pub fn set_source_url(&mut self, source_url: Option<String>) {
        self.canonical_url = embed::normalize(source_url.as_deref());
        self.source_url = source_url;
    }

    /// Display title, falling back the same way the player does.
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Video Player")
    }
}

impl Default for VideoDescriptor {
    fn default() -> Self {
        Self::new(VideoSelection::default())
    }
}

/// A timestamped note. Used for both assistant keypoints and personal notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub timestamp: String,
    pub title: String,
    pub description: String,
}

impl Annotation {
    pub fn new(
        timestamp: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_follows_source_url() {
        let mut video = VideoDescriptor::new(VideoSelection::from_url(
            "https://youtube.com/watch?v=ABC123",
        ));
        assert_eq!(video.canonical_url(), "https://www.youtube.com/embed/ABC123");

        video.set_source_url(Some("https://youtu.be/XYZ789".into()));
        assert_eq!(video.canonical_url(), "https://www.youtube.com/embed/XYZ789");

        video.set_source_url(None);
        assert_eq!(video.canonical_url(), embed::FALLBACK_EMBED_URL);
    }

    #[test]
    fn default_descriptor_is_playable() {
        let video = VideoDescriptor::default();
        assert_eq!(video.canonical_url(), embed::FALLBACK_EMBED_URL);
        assert_eq!(video.title(), "Video Player");
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatTurn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
