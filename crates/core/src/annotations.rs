use tokio::{sync::mpsc, task::JoinError};

use crate::{
    config::TimestampRule,
    error::{SessionError, ValidationError},
    guard::{OperationGuard, OperationKind, OperationState, Ticket},
    types::Annotation,
};

/// Assistant keypoints and personal notes for the current video.
#[derive(Debug)]
pub struct AnnotationStore {
    keypoints: Vec<Annotation>,
    notes: Vec<Annotation>,
    generation: OperationGuard,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            keypoints: Vec::new(),
            notes: Vec::new(),
            generation: OperationGuard::new(OperationKind::GenerateKeypoints),
        }
    }

    pub fn keypoints(&self) -> &[Annotation] {
        &self.keypoints
    }

    pub fn notes(&self) -> &[Annotation] {
        &self.notes
    }

    pub fn generation(&self) -> &OperationGuard {
        &self.generation
    }

    pub fn generation_state(&self) -> OperationState {
        self.generation.state()
    }

    /// Start keypoint generation unless one is already running.
    pub fn generate_keypoints<Fut, C, F>(
        &mut self,
        completions: &mpsc::UnboundedSender<C>,
        task: Fut,
        complete: F,
    ) -> Result<Ticket, SessionError>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
        C: Send + 'static,
        F: FnOnce(Ticket, Result<Fut::Output, JoinError>) -> C + Send + 'static,
    {
        self.generation.trigger(completions, task, complete)
    }

    /// Replace all keypoints with a finished generation, keeping its order.
    pub fn apply_keypoints(&mut self, ticket: Ticket, keypoints: Vec<Annotation>) -> bool {
        if !self.generation.succeed(ticket) {
            return false;
        }
        self.keypoints = keypoints;
        true
    }

    pub fn fail_keypoints(&mut self, ticket: Ticket, reason: impl Into<String>) -> bool {
        self.generation.fail(ticket, reason)
    }

    pub fn discard_keypoints(&mut self, ticket: Ticket) -> bool {
        self.generation.release(ticket)
    }

    /// Append a personal note after checking every field is filled in.
    pub fn add_note(
        &mut self,
        note: Annotation,
        rule: TimestampRule,
    ) -> Result<&[Annotation], ValidationError> {
        validate_note(&note, rule)?;
        self.notes.push(note);
        Ok(&self.notes)
    }

    /// Drop both collections. An in-flight generation keeps its guard.
    pub fn clear(&mut self) {
        self.keypoints.clear();
        self.notes.clear();
        self.generation.reset();
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_note(note: &Annotation, rule: TimestampRule) -> Result<(), ValidationError> {
    let fields = [
        ("timestamp", &note.timestamp),
        ("title", &note.title),
        ("description", &note.description),
    ];
    if let Some((field, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ValidationError::Missing { field: *field });
    }
    rule.check(&note.timestamp)
}
