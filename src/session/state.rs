//! Session lifecycle states
//!
//! ```text
//! Open -> AwaitingInput -> RequestSent -> DirectReply ----------------------------> ReplyDelivered -> AwaitingInput
//!                                      \-> ToolCallReceived -> ToolExecuted -> FollowupSent -/
//! ```
//! Any non-terminal state may fall back to `AwaitingInput` when a turn is
//! aborted, and any state may move to the terminal `Closed`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    AwaitingInput,
    RequestSent,
    DirectReply,
    ToolCallReceived,
    ToolExecuted,
    FollowupSent,
    ReplyDelivered,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::{
            AwaitingInput, Closed, DirectReply, FollowupSent, Open, ReplyDelivered, RequestSent,
            ToolCallReceived, ToolExecuted,
        };

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Closed)
            | (Open, AwaitingInput)
            | (AwaitingInput, RequestSent)
            | (RequestSent, DirectReply | ToolCallReceived)
            | (ToolCallReceived, ToolExecuted)
            // A structural dispatch failure skips the follow-up
            | (ToolExecuted, FollowupSent | ReplyDelivered)
            | (DirectReply | FollowupSent, ReplyDelivered) => true,
            // Turn aborted, or the loop's return to waiting
            (RequestSent | DirectReply | ToolCallReceived | ToolExecuted | FollowupSent | ReplyDelivered, AwaitingInput) => true,
            _ => false,
        }
    }

    pub fn transition(self, next: SessionState) -> Result<SessionState, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}
