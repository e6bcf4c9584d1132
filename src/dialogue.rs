//! Conversation history exchanged with the completion service
//!
//! A `Dialogue` is append-only: turns are never reordered or removed, and the
//! whole sequence is re-sent on every completion round.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A function call requested by the completion service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as emitted by the service
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Textual outcome of dispatching one `ToolCall`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: message.into(),
            is_error: true,
        }
    }
}

/// Role of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One role-tagged message unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System {
        text: String,
    },
    User {
        text: String,
    },
    Assistant {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool(ToolResult),
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Turn::System { .. } => Role::System,
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
            Turn::Tool(_) => Role::Tool,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Turn::System { text } | Turn::User { text } | Turn::Assistant { text, .. } => text,
            Turn::Tool(result) => &result.content,
        }
    }
}

/// Violations of the tool-call pairing rules
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("tool result {0} does not match a pending tool call")]
    UnmatchedToolResult(String),
    #[error("tool call id {0} is already used in this dialogue")]
    DuplicateToolCallId(String),
}

/// Ordered, append-only conversation history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dialogue {
    turns: Vec<Turn>,
}

impl Dialogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dialogue seeded with system-role turns
    pub fn with_system<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dialogue = Self::new();
        for prompt in prompts {
            dialogue.push_system(prompt);
        }
        dialogue
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::System { text: text.into() });
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User { text: text.into() });
    }

    /// Append an assistant turn. Tool call ids must be unique across the
    /// whole dialogue so every result pairs with exactly one call.
    pub fn push_assistant(
        &mut self,
        text: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Result<(), ProtocolError> {
        let mut seen = self.tool_call_ids();
        for call in &tool_calls {
            if !seen.insert(call.id.as_str()) {
                return Err(ProtocolError::DuplicateToolCallId(call.id.clone()));
            }
        }
        self.turns.push(Turn::Assistant {
            text: text.into(),
            tool_calls,
        });
        Ok(())
    }

    /// Append a tool result answering a pending call
    pub fn push_tool_result(&mut self, result: ToolResult) -> Result<(), ProtocolError> {
        let pending = self
            .pending_tool_calls()
            .iter()
            .any(|call| call.id == result.tool_call_id);
        if !pending {
            return Err(ProtocolError::UnmatchedToolResult(result.tool_call_id));
        }
        self.turns.push(Turn::Tool(result));
        Ok(())
    }

    /// Tool calls emitted so far that have no result yet
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        let answered: HashSet<&str> = self
            .turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::Tool(result) => Some(result.tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::Assistant { tool_calls, .. } => Some(tool_calls.iter()),
                _ => None,
            })
            .flatten()
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    fn tool_call_ids(&self) -> HashSet<&str> {
        self.turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::Assistant { tool_calls, .. } => Some(tool_calls.iter()),
                _ => None,
            })
            .flatten()
            .map(|call| call.id.as_str())
            .collect()
    }
}
