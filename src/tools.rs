//! Tool dispatch for completion-service function calls
//!
//! The set of callable functions is closed. Arguments are parsed into a
//! typed record per function, and unknown fields are rejected.

mod create_username;
mod fetch_photos;

pub use create_username::CreateUsernameTool;
pub use fetch_photos::FetchPhotosTool;

use crate::dialogue::ToolCall;
use crate::llm::ToolDefinition;
use crate::store::{KeyValueCache, PhotoStore, UserDirectory};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cache key holding the username most recently resolved in chat
pub const ACTIVE_USERNAME_KEY: &str = "username";

/// How long a resolved username stays active
pub const ACTIVE_USERNAME_TTL: Duration = Duration::from_secs(5 * 60);

/// Structural dispatch failures. Domain absence is never one of these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unsupported tool call: {0}")]
    UnknownFunction(String),
    #[error("malformed arguments for {function}: {reason}")]
    MalformedArguments {
        function: &'static str,
        reason: String,
    },
}

/// Closed enumeration of callable functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFunction {
    CreateUsername,
    FetchPhotos,
}

impl ToolFunction {
    pub const ALL: [ToolFunction; 2] = [ToolFunction::CreateUsername, ToolFunction::FetchPhotos];

    pub fn name(self) -> &'static str {
        match self {
            ToolFunction::CreateUsername => "CreateUsername",
            ToolFunction::FetchPhotos => "FetchPhotos",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Input for `CreateUsername`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUsernameArgs {
    pub username: String,
}

/// Input for `FetchPhotos`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchPhotosArgs {
    pub username: String,
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    CreateUsername(CreateUsernameArgs),
    FetchPhotos(FetchPhotosArgs),
}

impl ToolInvocation {
    /// Parse a raw call into its typed variant
    pub fn parse(call: &ToolCall) -> Result<Self, DispatchError> {
        let function = ToolFunction::from_name(&call.name)
            .ok_or_else(|| DispatchError::UnknownFunction(call.name.clone()))?;

        match function {
            ToolFunction::CreateUsername => {
                let mut args: CreateUsernameArgs = parse_args(function, &call.arguments)?;
                args.username = require_username(function, &args.username)?;
                Ok(ToolInvocation::CreateUsername(args))
            }
            ToolFunction::FetchPhotos => {
                let mut args: FetchPhotosArgs = parse_args(function, &call.arguments)?;
                args.username = require_username(function, &args.username)?;
                Ok(ToolInvocation::FetchPhotos(args))
            }
        }
    }

    pub fn function(&self) -> ToolFunction {
        match self {
            ToolInvocation::CreateUsername(_) => ToolFunction::CreateUsername,
            ToolInvocation::FetchPhotos(_) => ToolFunction::FetchPhotos,
        }
    }
}

fn parse_args<T: DeserializeOwned>(function: ToolFunction, raw: &str) -> Result<T, DispatchError> {
    serde_json::from_str(raw).map_err(|e| DispatchError::MalformedArguments {
        function: function.name(),
        reason: e.to_string(),
    })
}

fn require_username(function: ToolFunction, username: &str) -> Result<String, DispatchError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(DispatchError::MalformedArguments {
            function: function.name(),
            reason: "username must not be empty".to_string(),
        });
    }
    Ok(username.to_string())
}

/// Shared `username` parameter schema
fn username_schema() -> Value {
    json!({
        "type": "object",
        "required": ["username"],
        "properties": {
            "username": {
                "type": "string",
                "description": "the username, e.g., Abhi0512"
            }
        }
    })
}

/// Routes tool calls to their local actions
pub struct ToolDispatcher {
    create_username: CreateUsernameTool,
    fetch_photos: FetchPhotosTool,
}

impl ToolDispatcher {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        photos: Arc<dyn PhotoStore>,
        cache: Arc<dyn KeyValueCache>,
    ) -> Self {
        Self {
            create_username: CreateUsernameTool::new(users.clone(), cache),
            fetch_photos: FetchPhotosTool::new(users, photos),
        }
    }

    /// Tool schema sent with every completion request
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![CreateUsernameTool::definition(), FetchPhotosTool::definition()]
    }

    /// Run one call and return its textual outcome
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String, DispatchError> {
        let invocation = ToolInvocation::parse(call)?;
        tracing::info!(
            tool_call_id = %call.id,
            function = invocation.function().name(),
            "Dispatching tool call"
        );

        let output = match invocation {
            ToolInvocation::CreateUsername(args) => self.create_username.run(args).await,
            ToolInvocation::FetchPhotos(args) => self.fetch_photos.run(args).await,
        };
        Ok(output)
    }
}
