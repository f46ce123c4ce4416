use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::guard::OperationKind;

#[derive(Clone, Debug, Serialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub session_id: Uuid,
    pub timestamp: SystemTime,
}

impl EventHeader {
    fn new(session_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            session_id,
            timestamp: SystemTime::now(),
        }
    }
}

/// Something the renderer may want to redraw for.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventKind {
    VideoSelected { canonical_url: String },
    KeypointsReplaced { count: usize },
    NoteAdded { count: usize },
    TurnAppended { count: usize },
    OperationFailed { kind: OperationKind, reason: String },
    StaleResultDiscarded { kind: OperationKind, stale_session_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionEvent {
    pub header: EventHeader,
    pub kind: SessionEventKind,
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            SessionEventKind::VideoSelected { .. } => "video.selected",
            SessionEventKind::KeypointsReplaced { .. } => "keypoints.replaced",
            SessionEventKind::NoteAdded { .. } => "note.added",
            SessionEventKind::TurnAppended { .. } => "chat.turn_appended",
            SessionEventKind::OperationFailed { .. } => "operation.failed",
            SessionEventKind::StaleResultDiscarded { .. } => "operation.stale_discarded",
        }
    }
}

/// Fan-out of session events. Publishing with no subscribers is fine.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, session_id: Uuid, kind: SessionEventKind) {
        let event = SessionEvent {
            header: EventHeader::new(session_id),
            kind,
        };
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let session_id = Uuid::new_v4();

        bus.publish(session_id, SessionEventKind::NoteAdded { count: 1 });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.header.session_id, session_id);
        assert_eq!(event.event_type(), "note.added");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        EventBus::default().publish(Uuid::nil(), SessionEventKind::TurnAppended { count: 1 });
    }
}
