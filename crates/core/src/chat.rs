use serde::Serialize;
use tokio::{sync::mpsc, task::JoinError};

use crate::{
    error::{AssistantError, SessionError, ValidationError},
    guard::{OperationGuard, OperationKind, OperationState, Ticket},
    types::ChatTurn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    AwaitingInput,
    AwaitingResponse,
}

/// Strictly turn-taking conversation: one outstanding assistant response.
#[derive(Debug)]
pub struct ChatSession {
    transcript: Vec<ChatTurn>,
    response: OperationGuard,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            response: OperationGuard::new(OperationKind::ChatResponse),
        }
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn response(&self) -> &OperationGuard {
        &self.response
    }

    pub fn response_state(&self) -> OperationState {
        self.response.state()
    }

    pub fn phase(&self) -> ChatPhase {
        if self.response.is_pending() {
            ChatPhase::AwaitingResponse
        } else {
            ChatPhase::AwaitingInput
        }
    }

    /// Append the user's turn and ask for a reply.
    ///
    /// `respond` receives the transcript preceding the new turn and the new
    /// turn's content, and returns the future producing the reply.
    pub fn submit_turn<Fut, C, R, F>(
        &mut self,
        content: &str,
        completions: &mpsc::UnboundedSender<C>,
        respond: R,
        complete: F,
    ) -> Result<Ticket, SessionError>
    where
        R: FnOnce(Vec<ChatTurn>, String) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
        C: Send + 'static,
        F: FnOnce(Ticket, Result<Fut::Output, JoinError>) -> C + Send + 'static,
    {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::Missing { field: "message" }.into());
        }
        if self.response.is_pending() {
            return Err(SessionError::Rejected {
                kind: self.response.kind(),
            });
        }

        let history = self.transcript.clone();
        let task = respond(history, content.to_string());
        let ticket = self.response.trigger(completions, task, complete)?;
        self.transcript.push(ChatTurn::user(content));
        Ok(ticket)
    }

    /// Append the assistant reply.
    ///
    /// A blank reply fails the response with [`AssistantError::EmptyReply`].
    /// `Ok(false)` means the ticket was not the outstanding one.
    pub fn apply_reply(&mut self, ticket: Ticket, reply: String) -> Result<bool, AssistantError> {
        let reply = reply.trim();
        if reply.is_empty() {
            let err = AssistantError::EmptyReply;
            return if self.response.fail(ticket, err.to_string()) {
                Err(err)
            } else {
                Ok(false)
            };
        }
        if !self.response.succeed(ticket) {
            return Ok(false);
        }
        self.transcript.push(ChatTurn::assistant(reply));
        Ok(true)
    }

    /// The user's turn stays in the transcript.
    pub fn fail_reply(&mut self, ticket: Ticket, reason: impl Into<String>) -> bool {
        self.response.fail(ticket, reason)
    }

    pub fn discard_reply(&mut self, ticket: Ticket) -> bool {
        self.response.release(ticket)
    }

    /// Empty the transcript. An outstanding response keeps its guard.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.response.reset();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::types::Role;

    type Completion = (Ticket, Result<String, JoinError>);

    fn echo(history: Vec<ChatTurn>, content: String) -> impl Future<Output = String> {
        async move { format!("{} earlier turns, you said {content}", history.len()) }
    }

    #[tokio::test]
    async fn user_turn_is_visible_before_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut chat = ChatSession::new();

        let ticket = chat
            .submit_turn("  hello  ", &tx, echo, |t, reply| (t, reply))
            .unwrap();
        assert_eq!(chat.transcript(), [ChatTurn::user("hello")].as_slice());
        assert_eq!(chat.phase(), ChatPhase::AwaitingResponse);

        let (received, reply) = rx.recv().await.unwrap();
        assert_eq!(received, ticket);
        assert_matches!(chat.apply_reply(received, reply.unwrap()), Ok(true));

        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(chat.transcript()[1].role, Role::Assistant);
        assert_eq!(chat.transcript()[1].content, "0 earlier turns, you said hello");
        assert_eq!(chat.phase(), ChatPhase::AwaitingInput);
    }

    #[tokio::test]
    async fn blank_content_is_rejected_without_mutation() {
        let (tx, _rx) = mpsc::unbounded_channel::<Completion>();
        let mut chat = ChatSession::new();

        let err = chat.submit_turn(" \n ", &tx, echo, |t, r| (t, r)).unwrap_err();
        assert_matches!(
            err,
            SessionError::Validation(ValidationError::Missing { field: "message" })
        );
        assert!(chat.transcript().is_empty());
        assert_eq!(chat.response_state(), OperationState::Idle);
    }

    #[tokio::test]
    async fn second_turn_waits_for_the_first_reply() {
        let (tx, _rx) = mpsc::unbounded_channel::<Completion>();
        let mut chat = ChatSession::new();

        chat.submit_turn("first", &tx, echo, |t, r| (t, r)).unwrap();
        let err = chat.submit_turn("second", &tx, echo, |t, r| (t, r)).unwrap_err();

        assert_matches!(
            err,
            SessionError::Rejected {
                kind: OperationKind::ChatResponse
            }
        );
        assert_eq!(chat.transcript(), [ChatTurn::user("first")].as_slice());
    }

    #[test]
    fn failed_reply_keeps_user_turn() {
        let mut chat = ChatSession::new();
        let ticket = chat.response.begin().unwrap();
        chat.transcript.push(ChatTurn::user("hello"));

        assert!(chat.fail_reply(ticket, "timeout"));
        assert_eq!(chat.transcript(), [ChatTurn::user("hello")].as_slice());
        assert_eq!(chat.response_state(), OperationState::Failed);
        assert_eq!(chat.phase(), ChatPhase::AwaitingInput);
    }

    #[test]
    fn blank_reply_is_a_failure() {
        let mut chat = ChatSession::new();
        let ticket = chat.response.begin().unwrap();

        assert_matches!(
            chat.apply_reply(ticket, "   ".into()),
            Err(AssistantError::EmptyReply)
        );
        assert!(chat.transcript().is_empty());
        assert_eq!(chat.response_state(), OperationState::Failed);
        assert_eq!(
            chat.response().last_error(),
            Some("Assistant returned an empty reply")
        );

        // A late reply for a ticket that is no longer outstanding changes nothing.
        assert_matches!(chat.apply_reply(ticket, "hi".into()), Ok(false));
        assert!(chat.transcript().is_empty());
    }
}
