//! `OpenAI` chat-completions provider

use super::types::{Completion, CompletionRequest, CompletionResponse, Usage};
use super::{CompletionService, UpstreamError};
use crate::dialogue::{ToolCall, Turn};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Connection settings for the chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Bounded per-request timeout
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl OpenAIService {
    pub fn new(config: OpenAIConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.filter(|key| !key.is_empty()),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
        })
    }

    fn translate_request(&self, request: &CompletionRequest) -> OpenAIRequest {
        let messages = request.turns.iter().map(Self::translate_turn).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAITool {
                        r#type: "function".to_string(),
                        function: OpenAIFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            tools,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        }
    }

    fn translate_turn(turn: &Turn) -> OpenAIMessage {
        match turn {
            Turn::System { text } => OpenAIMessage::text("system", text),
            Turn::User { text } => OpenAIMessage::text("user", text),
            Turn::Assistant { text, tool_calls } => {
                let tool_calls = if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| OpenAIToolCall {
                                id: call.id.clone(),
                                r#type: "function".to_string(),
                                function: OpenAIFunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };
                // Assistant turns that only carry tool calls send no content
                let content = if text.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(text.clone())
                };
                OpenAIMessage {
                    role: "assistant".to_string(),
                    content,
                    name: None,
                    tool_calls,
                    tool_call_id: None,
                }
            }
            Turn::Tool(result) => OpenAIMessage {
                role: "tool".to_string(),
                content: Some(if result.is_error {
                    format!("Error: {}", result.content)
                } else {
                    result.content.clone()
                }),
                name: Some(result.name.clone()),
                tool_calls: None,
                tool_call_id: Some(result.tool_call_id.clone()),
            },
        }
    }

    fn normalize_response(resp: OpenAIResponse) -> Result<CompletionResponse, UpstreamError> {
        if resp.choices.len() != 1 {
            return Err(UpstreamError::choice_count(resp.choices.len()));
        }
        let Some(choice) = resp.choices.into_iter().next() else {
            return Err(UpstreamError::choice_count(0));
        };

        let text = choice.message.content.unwrap_or_default();
        let calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter(|tc| !tc.function.name.is_empty())
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let completion = if calls.is_empty() {
            Completion::Reply(text)
        } else {
            Completion::ToolCalls { text, calls }
        };

        let usage = resp.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u64::from(u.prompt_tokens),
            output_tokens: u64::from(u.completion_tokens),
        });

        Ok(CompletionResponse { completion, usage })
    }
}

#[async_trait]
impl CompletionService for OpenAIService {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(UpstreamError::auth("OPENAI_API_KEY is not set"));
        };
        let openai_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    UpstreamError::network(format!("Connection failed: {e}"))
                } else {
                    UpstreamError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<OpenAIErrorResponse>(&body) {
                let message = error_resp.error.message;
                return Err(match status.as_u16() {
                    401 | 403 => UpstreamError::auth(format!("Authentication failed: {message}")),
                    429 => UpstreamError::rate_limit(format!("Rate limit exceeded: {message}")),
                    400 => UpstreamError::invalid_request(format!("Invalid request: {message}")),
                    500..=599 => UpstreamError::server_error(format!("Server error: {message}")),
                    _ => UpstreamError::unknown(format!("HTTP {status}: {message}")),
                });
            }
            return Err(UpstreamError::unknown(format!("HTTP {status} error: {body}")));
        }

        let openai_response: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            UpstreamError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(openai_response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(text.to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[allow(dead_code)] // Part of API response, not always used
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
