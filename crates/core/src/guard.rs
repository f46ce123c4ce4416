use std::fmt;

use serde::Serialize;
use tokio::{sync::mpsc, task::JoinError};
use tracing::{debug, warn};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    SelectVideo,
    GenerateKeypoints,
    ChatResponse,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::SelectVideo,
        OperationKind::GenerateKeypoints,
        OperationKind::ChatResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SelectVideo => "video selection",
            OperationKind::GenerateKeypoints => "keypoint generation",
            OperationKind::ChatResponse => "assistant response",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Identifies one accepted trigger of a guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket {
    pub kind: OperationKind,
    pub seq: u64,
}

/// Per-operation state machine allowing at most one in-flight call.
#[derive(Debug)]
pub struct OperationGuard {
    kind: OperationKind,
    state: OperationState,
    next_seq: u64,
    in_flight: Option<Ticket>,
    last_error: Option<String>,
}

impl OperationGuard {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            state: OperationState::Idle,
            next_seq: 0,
            in_flight: None,
            last_error: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == OperationState::Pending
    }

    /// Reason of the most recent failure, cleared by the next accepted trigger.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Move to `Pending` without spawning anything.
    pub fn begin(&mut self) -> Result<Ticket, SessionError> {
        if self.is_pending() {
            debug!(kind = %self.kind, "trigger rejected, already pending");
            return Err(SessionError::Rejected { kind: self.kind });
        }

        let ticket = Ticket {
            kind: self.kind,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.in_flight = Some(ticket);
        self.state = OperationState::Pending;
        self.last_error = None;
        Ok(ticket)
    }

    /// Accept a trigger and run `task` on the tokio runtime.
    ///
    /// When `task` finishes its output is wrapped by `complete` and sent to
    /// `completions`; the owner settles the guard once it applies the result.
    /// A task that panics or gets cancelled still completes, with the
    /// `JoinError` in place of its output.
    pub fn trigger<Fut, C, F>(
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
        let ticket = self.begin()?;
        debug!(kind = %ticket.kind, seq = ticket.seq, "operation started");

        let completions = completions.clone();
        let call = tokio::spawn(task);
        tokio::spawn(async move {
            let output = call.await;
            if let Err(e) = &output {
                warn!(kind = %ticket.kind, seq = ticket.seq, error = %e, "operation task aborted");
            }
            if completions.send(complete(ticket, output)).is_err() {
                debug!(kind = %ticket.kind, seq = ticket.seq, "owner gone, completion dropped");
            }
        });

        Ok(ticket)
    }

    pub fn succeed(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket, OperationState::Succeeded)
    }

    pub fn fail(&mut self, ticket: Ticket, reason: impl Into<String>) -> bool {
        let settled = self.settle(ticket, OperationState::Failed);
        if settled {
            self.last_error = Some(reason.into());
        }
        settled
    }

    /// Settle without an outcome, used when a result is discarded.
    pub fn release(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket, OperationState::Idle)
    }

    /// Forget a terminal outcome. A pending call stays pending.
    pub fn reset(&mut self) {
        if !self.is_pending() {
            self.state = OperationState::Idle;
            self.last_error = None;
        }
    }

    fn settle(&mut self, ticket: Ticket, state: OperationState) -> bool {
        if self.in_flight != Some(ticket) {
            warn!(kind = %self.kind, seq = ticket.seq, "ignoring completion for unknown ticket");
            return false;
        }
        self.in_flight = None;
        self.state = state;
        true
    }
}
