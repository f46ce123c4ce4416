//! Konspekt Core Library
//!
//! Session orchestration for watching a video with an assistant: canonical
//! embed links, AI keypoints, personal notes and a turn-taking Q&A chat.

pub mod annotations;
pub mod assistant;
pub mod chat;
pub mod config;
pub mod embed;
pub mod error;
pub mod events;
pub mod format;
pub mod guard;
pub mod provider;
pub mod scripted;
pub mod session;
pub mod types;

// Re-export commonly used items at crate root
pub use annotations::AnnotationStore;
pub use assistant::Assistant;
pub use chat::{ChatPhase, ChatSession};
pub use config::{SessionConfig, TimestampRule};
pub use embed::{FALLBACK_EMBED_URL, normalize};
pub use error::{AssistantError, Result, SessionError, ValidationError};
pub use events::{SessionEvent, SessionEventKind};
pub use format::{format_annotations, format_timestamp, format_transcript, parse_timestamp};
pub use guard::{OperationGuard, OperationKind, OperationState, Ticket};
pub use provider::{Provider, ProviderAssistant, ProviderConfig, ProviderError};
pub use scripted::ScriptedAssistant;
pub use session::{CompletionReport, CompletionStatus, SessionController, SessionSnapshot};
pub use types::{Annotation, ChatTurn, Role, VideoDescriptor, VideoSelection};
