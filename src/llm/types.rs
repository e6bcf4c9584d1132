//! Common types for completion exchanges

use crate::dialogue::{Dialogue, ToolCall, Turn};

/// One completion request: the full dialogue plus the callable tools
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(dialogue: &Dialogue, tools: Vec<ToolDefinition>) -> Self {
        Self {
            turns: dialogue.turns().to_vec(),
            tools,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Tool definition
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// What the service answered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Plain text reply
    Reply(String),
    /// One or more function calls, with any text that accompanied them
    ToolCalls { text: String, calls: Vec<ToolCall> },
}

/// Completion response
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub completion: Completion,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            completion: Completion::Reply(text.into()),
            usage: Usage::default(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            completion: Completion::ToolCalls {
                text: String::new(),
                calls,
            },
            usage: Usage::default(),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
