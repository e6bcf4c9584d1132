//! Chat session: one connection, one dialogue
//!
//! The turn loop owns the inbound half of the connection and processes one
//! frame at a time. Replies and broadcast notifications both go through the
//! session's `Outbound` queue, which a single writer task drains.

mod state;
mod transport;
mod writer;

pub use state::{SessionState, TransitionError};
pub use transport::{FrameSink, FrameSource, TransportError};
pub use writer::{spawn_writer, Outbound};

use crate::dialogue::{Dialogue, ProtocolError, ToolCall, ToolResult};
use crate::llm::{Completion, CompletionRequest, CompletionService, UpstreamError};
use crate::relay::{BroadcastRelay, Subscription};
use crate::tools::{DispatchError, ToolDispatcher};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Reply sent when a tool call could not be dispatched
pub const GENERIC_REPLY: &str = "Sorry, I couldn't complete that request.";

/// Per-request knobs for the first completion of a turn
#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Depth of the outbound frame queue
    pub outbound_capacity: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_tokens: Some(50),
            temperature: Some(0.1),
            outbound_capacity: 32,
        }
    }
}

/// Shared collaborators handed to every session
#[derive(Clone)]
pub struct SessionContext {
    pub completions: Arc<dyn CompletionService>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub relay: BroadcastRelay,
    pub persona: Arc<[String]>,
    pub settings: TurnSettings,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("completion failed: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("tool dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("dialogue protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub struct ChatSession<R, W> {
    id: String,
    state: SessionState,
    dialogue: Dialogue,
    source: R,
    sink: Option<W>,
    context: SessionContext,
    cancel: CancellationToken,
}

impl<R, W> ChatSession<R, W>
where
    R: FrameSource,
    W: FrameSink + 'static,
{
    /// Bind a connection and seed a fresh dialogue with the persona
    pub fn open(source: R, sink: W, context: SessionContext) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let dialogue = Dialogue::with_system(context.persona.iter().cloned());
        tracing::info!(session_id = %id, persona_turns = dialogue.len(), "Session opened");
        Self {
            id,
            state: SessionState::Open,
            dialogue,
            source,
            sink: Some(sink),
            context,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dialogue(&self) -> &Dialogue {
        &self.dialogue
    }

    /// Token that closes the session when cancelled
    pub fn close_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request shutdown; `run` releases everything before returning
    #[allow(dead_code)] // Used in tests
    pub fn close(&self) {
        self.cancel.cancel();
    }

    fn advance(&mut self, next: SessionState) -> Result<(), TransitionError> {
        self.state = self.state.transition(next)?;
        tracing::trace!(session_id = %self.id, state = ?self.state, "Session state");
        Ok(())
    }

    /// Serve the connection until the peer leaves, a transport error occurs,
    /// or the session is closed. The broadcast subscription, drain task and
    /// writer task are released on every exit path.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let Some(sink) = self.sink.take() else {
            return Err(TransportError::Closed.into());
        };

        let (outbound, writer) = spawn_writer(
            sink,
            self.context.settings.outbound_capacity,
            self.cancel.clone(),
        );
        let drain_cancel = self.cancel.child_token();
        let drain = tokio::spawn(drain_broadcasts(
            self.context.relay.subscribe(),
            outbound.clone(),
            drain_cancel.clone(),
            self.id.clone(),
        ));

        let result = match self.advance(SessionState::AwaitingInput) {
            Ok(()) => self.turn_loop(&outbound).await,
            Err(e) => Err(e.into()),
        };

        // The writer exits once the drain and the loop drop their handles
        drain_cancel.cancel();
        if let Err(e) = drain.await {
            tracing::warn!(session_id = %self.id, error = %e, "Broadcast drain task failed");
        }
        drop(outbound);
        let write_result = match writer.await {
            Ok(result) => result,
            Err(e) => Err(TransportError::Write(e.to_string())),
        };

        self.cancel.cancel();
        self.state = SessionState::Closed;
        tracing::info!(session_id = %self.id, turns = self.dialogue.len(), "Session closed");

        match (result, write_result) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn turn_loop(&mut self, outbound: &Outbound) -> Result<(), SessionError> {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!(session_id = %self.id, "Session cancelled");
                    return Ok(());
                }
                frame = self.source.next_frame() => frame?,
            };
            let Some(text) = frame else {
                tracing::info!(session_id = %self.id, "Client closed connection");
                return Ok(());
            };

            let reply = match self.handle_inbound(&text).await {
                Ok(reply) => reply,
                Err(SessionError::Dispatch(e)) => {
                    tracing::warn!(session_id = %self.id, error = %e, "Tool call could not be dispatched");
                    GENERIC_REPLY.to_string()
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.id, error = %e, "Turn aborted");
                    continue;
                }
            };

            outbound.send(reply).await?;
            self.advance(SessionState::ReplyDelivered)?;
            self.advance(SessionState::AwaitingInput)?;
        }
    }

    /// Run one turn cycle for an inbound user message and return the reply
    /// text to deliver.
    ///
    /// On `SessionError::Dispatch` the error tool result is already recorded
    /// and the caller is expected to deliver `GENERIC_REPLY`. Any other error
    /// aborts the turn and returns the session to `AwaitingInput`; turns
    /// appended before the failure stay in the dialogue.
    pub async fn handle_inbound(&mut self, text: &str) -> Result<String, SessionError> {
        let result = self.run_turn(text).await;
        if let Err(e) = &result {
            if !matches!(e, SessionError::Dispatch(_))
                && self.state.can_transition_to(SessionState::AwaitingInput)
            {
                self.state = SessionState::AwaitingInput;
            }
        }
        result
    }

    /// Move a fresh session or a finished cycle back to `AwaitingInput`
    fn begin_cycle(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Open | SessionState::ReplyDelivered => {
                self.advance(SessionState::AwaitingInput)
            }
            // The reply of the previous turn was handed to the caller
            SessionState::DirectReply | SessionState::FollowupSent | SessionState::ToolExecuted => {
                self.advance(SessionState::ReplyDelivered)?;
                self.advance(SessionState::AwaitingInput)
            }
            _ => Ok(()),
        }
    }

    async fn run_turn(&mut self, text: &str) -> Result<String, SessionError> {
        self.begin_cycle()?;
        self.advance(SessionState::RequestSent)?;
        self.dialogue.push_user(text);

        match request_completion(&self.dialogue, &self.context, &self.cancel, true).await? {
            Completion::Reply(reply) => {
                self.dialogue.push_assistant(reply.clone(), Vec::new())?;
                self.advance(SessionState::DirectReply)?;
                Ok(reply)
            }
            Completion::ToolCalls { text, calls } => self.run_tool_round(text, calls).await,
        }
    }

    async fn run_tool_round(
        &mut self,
        text: String,
        calls: Vec<ToolCall>,
    ) -> Result<String, SessionError> {
        let mut calls = calls.into_iter();
        let Some(call) = calls.next() else {
            return Err(UpstreamError::unknown("tool call response carried no calls").into());
        };
        let ignored: Vec<String> = calls.map(|c| c.name).collect();
        if !ignored.is_empty() {
            tracing::warn!(
                session_id = %self.id,
                dispatched = %call.name,
                ?ignored,
                "Multiple tool calls in one response, dispatching only the first"
            );
        }

        self.dialogue.push_assistant(text, vec![call.clone()])?;
        self.advance(SessionState::ToolCallReceived)?;

        let outcome = self.context.dispatcher.dispatch(&call).await;
        let result = match &outcome {
            Ok(output) => ToolResult::success(&call, output.clone()),
            Err(e) => ToolResult::error(&call, e.to_string()),
        };
        self.dialogue.push_tool_result(result)?;
        self.advance(SessionState::ToolExecuted)?;
        outcome?;

        self.advance(SessionState::FollowupSent)?;
        let followup =
            request_completion(&self.dialogue, &self.context, &self.cancel, false).await?;
        let reply = match followup {
            Completion::Reply(reply) => reply,
            Completion::ToolCalls { text, calls } => {
                tracing::warn!(
                    session_id = %self.id,
                    count = calls.len(),
                    "Follow-up asked for more tool calls, replying with its text only"
                );
                if text.trim().is_empty() {
                    GENERIC_REPLY.to_string()
                } else {
                    text
                }
            }
        };
        self.dialogue.push_assistant(reply.clone(), Vec::new())?;
        Ok(reply)
    }
}

/// One completion over the full dialogue, abandoned if the session closes.
/// The first request of a turn carries the sampling overrides; the
/// follow-up after a tool result does not.
async fn request_completion(
    dialogue: &Dialogue,
    context: &SessionContext,
    cancel: &CancellationToken,
    first_round: bool,
) -> Result<Completion, SessionError> {
    let mut request = CompletionRequest::new(dialogue, ToolDispatcher::definitions());
    if first_round {
        request = request
            .with_max_tokens(context.settings.max_tokens)
            .with_temperature(context.settings.temperature);
    }

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UpstreamError::cancelled()),
        response = context.completions.complete(&request) => response,
    }?;
    Ok(response.completion)
}

/// Forward relay messages into the session's outbound queue until the
/// session ends. The subscription is dropped, and so released, on return.
async fn drain_broadcasts(
    mut subscription: Subscription,
    outbound: Outbound,
    cancel: CancellationToken,
    session_id: String,
) {
    tracing::debug!(session_id = %session_id, subscriber_id = subscription.id(), "Broadcast drain started");
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = subscription.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        if outbound.send(message.to_string()).await.is_err() {
            break;
        }
    }
    tracing::debug!(session_id = %session_id, "Broadcast drain stopped");
}
