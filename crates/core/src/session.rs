use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinError,
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    annotations::AnnotationStore,
    assistant::Assistant,
    chat::{ChatPhase, ChatSession},
    config::SessionConfig,
    error::{AssistantError, Result, ValidationError},
    events::{EventBus, SessionEvent, SessionEventKind},
    guard::{OperationGuard, OperationKind, OperationState, Ticket},
    types::{Annotation, ChatTurn, VideoDescriptor, VideoSelection},
};

enum Outcome {
    VideoSelected {
        selection: VideoSelection,
        result: std::result::Result<(), AssistantError>,
    },
    Keypoints(std::result::Result<Vec<Annotation>, AssistantError>),
    Reply(std::result::Result<String, AssistantError>),
}

/// Finished collaborator call, tagged with the session it was started in.
struct Completion {
    session_id: Uuid,
    ticket: Ticket,
    outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionStatus {
    Applied,
    Failed { reason: String },
    /// The session moved on while the call was running.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub ticket: Ticket,
    pub status: CompletionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
    pub kind: OperationKind,
    pub state: OperationState,
    pub last_error: Option<String>,
}

/// Everything a renderer reads.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub video: VideoDescriptor,
    pub keypoints: Vec<Annotation>,
    pub notes: Vec<Annotation>,
    pub transcript: Vec<ChatTurn>,
    pub chat_phase: ChatPhase,
    pub operations: Vec<OperationSnapshot>,
}

/// Single owner of one video session's state.
///
/// Intents (`select_video`, `generate_keypoints`, `add_note`, `submit_turn`)
/// are validated and either applied immediately or handed to the assistant.
/// Results of assistant calls only touch the state once they pass through
/// [`SessionController::next_completion`] or [`SessionController::apply_ready`].
pub struct SessionController {
    assistant: Arc<dyn Assistant>,
    config: SessionConfig,
    session_id: Uuid,
    video: VideoDescriptor,
    annotations: AnnotationStore,
    chat: ChatSession,
    selection: OperationGuard,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: EventBus,
}

impl SessionController {
    pub fn new(assistant: Arc<dyn Assistant>, config: SessionConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            assistant,
            config,
            session_id: Uuid::new_v4(),
            video: VideoDescriptor::default(),
            annotations: AnnotationStore::new(),
            chat: ChatSession::new(),
            selection: OperationGuard::new(OperationKind::SelectVideo),
            completions_tx,
            completions_rx,
            events: EventBus::default(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn video(&self) -> &VideoDescriptor {
        &self.video
    }

    pub fn keypoints(&self) -> &[Annotation] {
        self.annotations.keypoints()
    }

    pub fn notes(&self) -> &[Annotation] {
        self.annotations.notes()
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        self.chat.transcript()
    }

    pub fn chat_phase(&self) -> ChatPhase {
        self.chat.phase()
    }

    pub fn state(&self, kind: OperationKind) -> OperationState {
        self.guard(kind).state()
    }

    pub fn last_error(&self, kind: OperationKind) -> Option<&str> {
        self.guard(kind).last_error()
    }

    pub fn has_pending(&self) -> bool {
        OperationKind::ALL
            .iter()
            .any(|kind| self.guard(*kind).is_pending())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let operations = OperationKind::ALL
            .into_iter()
            .map(|kind| {
                let guard = self.guard(kind);
                OperationSnapshot {
                    kind,
                    state: guard.state(),
                    last_error: guard.last_error().map(str::to_string),
                }
            })
            .collect();

        SessionSnapshot {
            session_id: self.session_id,
            video: self.video.clone(),
            keypoints: self.keypoints().to_vec(),
            notes: self.notes().to_vec(),
            transcript: self.transcript().to_vec(),
            chat_phase: self.chat_phase(),
            operations,
        }
    }

    /// Ask the assistant to take a new video. On success the whole session is
    /// replaced: new identity, no keypoints, no notes, empty transcript.
    pub fn select_video(&mut self, selection: VideoSelection) -> Result<Ticket> {
        let selection = validate_selection(selection)?;

        let assistant = Arc::clone(&self.assistant);
        let session_id = self.session_id;
        let request = selection.clone();

        let ticket = self.selection.trigger(
            &self.completions_tx,
            async move { assistant.select_video(&request).await },
            move |ticket, result| Completion {
                session_id,
                ticket,
                outcome: Outcome::VideoSelected {
                    selection,
                    result: joined(result),
                },
            },
        )?;
        Ok(ticket)
    }

    pub fn generate_keypoints(&mut self) -> Result<Ticket> {
        let assistant = Arc::clone(&self.assistant);
        let session_id = self.session_id;
        let video = self.video.clone();

        self.annotations.generate_keypoints(
            &self.completions_tx,
            async move { assistant.generate_keypoints(&video).await },
            move |ticket, result| Completion {
                session_id,
                ticket,
                outcome: Outcome::Keypoints(joined(result)),
            },
        )
    }

    pub fn add_note(&mut self, note: Annotation) -> Result<&[Annotation]> {
        let count = self
            .annotations
            .add_note(note, self.config.timestamp_rule)?
            .len();
        debug!(session_id = %self.session_id, count, "note added");
        self.events
            .publish(self.session_id, SessionEventKind::NoteAdded { count });
        Ok(self.annotations.notes())
    }

    pub fn submit_turn(&mut self, content: &str) -> Result<Ticket> {
        let assistant = Arc::clone(&self.assistant);
        let session_id = self.session_id;
        let video = self.video.clone();

        let ticket = self.chat.submit_turn(
            content,
            &self.completions_tx,
            move |history, content| async move {
                assistant.send_chat_turn(&video, &history, &content).await
            },
            move |ticket, result| Completion {
                session_id,
                ticket,
                outcome: Outcome::Reply(joined(result)),
            },
        )?;

        self.publish_turn_appended();
        Ok(ticket)
    }

    /// Wait for the next finished call and apply it.
    ///
    /// Returns `None` right away when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<CompletionReport> {
        if !self.has_pending() {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Apply every call that has already finished, without waiting.
    pub fn apply_ready(&mut self) -> Vec<CompletionReport> {
        let mut reports = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            reports.push(self.apply(completion));
        }
        reports
    }

    fn apply(&mut self, completion: Completion) -> CompletionReport {
        let Completion {
            session_id,
            ticket,
            outcome,
        } = completion;
        let stale = session_id != self.session_id;

        let status = match outcome {
            Outcome::VideoSelected { selection, result } => match result {
                Ok(()) => {
                    if self.selection.succeed(ticket) {
                        self.replace_video(selection);
                        CompletionStatus::Applied
                    } else {
                        CompletionStatus::Discarded
                    }
                }
                Err(e) => {
                    self.selection.fail(ticket, e.to_string());
                    self.failed(ticket, e)
                }
            },
            Outcome::Keypoints(_) if stale => {
                self.annotations.discard_keypoints(ticket);
                self.discarded(ticket, session_id)
            }
            Outcome::Keypoints(Ok(keypoints)) => {
                let count = keypoints.len();
                if self.annotations.apply_keypoints(ticket, keypoints) {
                    info!(session_id = %self.session_id, count, "keypoints replaced");
                    self.events
                        .publish(self.session_id, SessionEventKind::KeypointsReplaced { count });
                    CompletionStatus::Applied
                } else {
                    CompletionStatus::Discarded
                }
            }
            Outcome::Keypoints(Err(e)) => {
                self.annotations.fail_keypoints(ticket, e.to_string());
                self.failed(ticket, e)
            }
            Outcome::Reply(_) if stale => {
                self.chat.discard_reply(ticket);
                self.discarded(ticket, session_id)
            }
            Outcome::Reply(Ok(reply)) => match self.chat.apply_reply(ticket, reply) {
                Ok(true) => {
                    self.publish_turn_appended();
                    CompletionStatus::Applied
                }
                Ok(false) => CompletionStatus::Discarded,
                Err(e) => self.failed(ticket, e),
            },
            Outcome::Reply(Err(e)) => {
                self.chat.fail_reply(ticket, e.to_string());
                self.failed(ticket, e)
            }
        };

        CompletionReport { ticket, status }
    }

    fn replace_video(&mut self, selection: VideoSelection) {
        let previous = std::mem::replace(&mut self.session_id, Uuid::new_v4());
        self.video = VideoDescriptor::new(selection);
        self.annotations.clear();
        self.chat.clear();

        info!(
            previous_session_id = %previous,
            session_id = %self.session_id,
            canonical_url = self.video.canonical_url(),
            "video selected, session reset"
        );
        self.events.publish(
            self.session_id,
            SessionEventKind::VideoSelected {
                canonical_url: self.video.canonical_url().to_string(),
            },
        );
    }

    fn failed(&self, ticket: Ticket, error: AssistantError) -> CompletionStatus {
        let reason = error.to_string();
        warn!(kind = %ticket.kind, seq = ticket.seq, %reason, "operation failed");
        self.events.publish(
            self.session_id,
            SessionEventKind::OperationFailed {
                kind: ticket.kind,
                reason: reason.clone(),
            },
        );
        CompletionStatus::Failed { reason }
    }

    fn discarded(&self, ticket: Ticket, stale_session_id: Uuid) -> CompletionStatus {
        warn!(
            kind = %ticket.kind,
            seq = ticket.seq,
            %stale_session_id,
            session_id = %self.session_id,
            "discarding result for a replaced session"
        );
        self.events.publish(
            self.session_id,
            SessionEventKind::StaleResultDiscarded {
                kind: ticket.kind,
                stale_session_id,
            },
        );
        CompletionStatus::Discarded
    }

    fn publish_turn_appended(&self) {
        self.events.publish(
            self.session_id,
            SessionEventKind::TurnAppended {
                count: self.chat.transcript().len(),
            },
        );
    }

    fn guard(&self, kind: OperationKind) -> &OperationGuard {
        match kind {
            OperationKind::SelectVideo => &self.selection,
            OperationKind::GenerateKeypoints => self.annotations.generation(),
            OperationKind::ChatResponse => self.chat.response(),
        }
    }
}

/// Fold a panicked or cancelled call into an ordinary assistant failure.
fn joined<T>(
    result: std::result::Result<std::result::Result<T, AssistantError>, JoinError>,
) -> std::result::Result<T, AssistantError> {
    result.map_err(AssistantError::from).and_then(|inner| inner)
}

/// Trim the form and require a source URL that parses.
fn validate_selection(
    selection: VideoSelection,
) -> std::result::Result<VideoSelection, ValidationError> {
    let non_blank = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let source_url = non_blank(selection.source_url)
        .ok_or(ValidationError::Missing { field: "source_url" })?;
    Url::parse(&source_url).map_err(|e| ValidationError::MalformedUrl {
        value: source_url.clone(),
        reason: e.to_string(),
    })?;

    Ok(VideoSelection {
        name: non_blank(selection.name),
        description: non_blank(selection.description),
        source_url: Some(source_url),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{error::SessionError, scripted::ScriptedAssistant};

    fn controller() -> SessionController {
        SessionController::new(Arc::new(ScriptedAssistant::default()), SessionConfig::default())
    }

    #[test]
    fn selection_requires_a_parsable_url() {
        assert_matches!(
            validate_selection(VideoSelection::default()),
            Err(ValidationError::Missing { field: "source_url" })
        );
        assert_matches!(
            validate_selection(VideoSelection::from_url("   ")),
            Err(ValidationError::Missing { field: "source_url" })
        );
        assert_matches!(
            validate_selection(VideoSelection::from_url("youtu.be/XYZ789")),
            Err(ValidationError::MalformedUrl { .. })
        );

        let cleaned = validate_selection(
            VideoSelection::from_url(" https://youtu.be/XYZ789 ").with_name("  "),
        )
        .unwrap();
        assert_eq!(cleaned.source_url.as_deref(), Some("https://youtu.be/XYZ789"));
        assert_eq!(cleaned.name, None);
    }

    #[tokio::test]
    async fn invalid_selection_does_not_start_anything() {
        let mut session = controller();
        let err = session
            .select_video(VideoSelection::from_url("not a url"))
            .unwrap_err();

        assert_matches!(err, SessionError::Validation(ValidationError::MalformedUrl { .. }));
        assert_eq!(session.state(OperationKind::SelectVideo), OperationState::Idle);
        assert!(session.next_completion().await.is_none());
    }

    #[tokio::test]
    async fn selecting_video_updates_descriptor_and_identity() {
        let mut session = controller();
        let before = session.session_id();

        session
            .select_video(
                VideoSelection::from_url("https://youtube.com/watch?v=ABC123&t=5")
                    .with_name("German lesson"),
            )
            .unwrap();
        let report = session.next_completion().await.unwrap();

        assert_eq!(report.status, CompletionStatus::Applied);
        assert_ne!(session.session_id(), before);
        assert_eq!(session.video().canonical_url(), "https://www.youtube.com/embed/ABC123");
        assert_eq!(session.video().title(), "German lesson");
        assert_eq!(session.state(OperationKind::SelectVideo), OperationState::Succeeded);
    }

    #[tokio::test]
    async fn snapshot_lists_every_operation() {
        let mut session = controller();
        session.generate_keypoints().unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.operations.len(), 3);
        assert_eq!(snapshot.operations[1].kind, OperationKind::GenerateKeypoints);
        assert_eq!(snapshot.operations[1].state, OperationState::Pending);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["chat_phase"], "awaiting_input");
        assert_eq!(json["operations"][1]["state"], "pending");
    }

    #[tokio::test]
    async fn note_events_reach_subscribers() {
        let mut session = controller();
        let mut events = session.subscribe();

        session
            .add_note(Annotation::new("00:02:10", "Title", "Body"))
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type(), "note.added");
        assert_eq!(event.header.session_id, session.session_id());
    }
}
