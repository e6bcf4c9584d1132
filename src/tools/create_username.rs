//! `CreateUsername` - resolve or register the chatting user

use super::{username_schema, CreateUsernameArgs, ToolFunction, ACTIVE_USERNAME_KEY, ACTIVE_USERNAME_TTL};
use crate::llm::ToolDefinition;
use crate::store::{KeyValueCache, UserDirectory};
use std::sync::Arc;

pub struct CreateUsernameTool {
    users: Arc<dyn UserDirectory>,
    cache: Arc<dyn KeyValueCache>,
}

impl CreateUsernameTool {
    pub fn new(users: Arc<dyn UserDirectory>, cache: Arc<dyn KeyValueCache>) -> Self {
        Self { users, cache }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: ToolFunction::CreateUsername.name().to_string(),
            description: "creates the username or looks up an existing one; call this before the user uploads photos".to_string(),
            input_schema: username_schema(),
        }
    }

    /// Every outcome is conversational text; store failures included
    pub async fn run(&self, args: CreateUsernameArgs) -> String {
        let username = args.username;

        match self.users.fetch_by_username(&username).await {
            Ok(existing) => {
                if let Err(e) = self.remember(&existing.username).await {
                    tracing::warn!(error = %e, "Failed to cache active username");
                    return "something went wrong please try again".to_string();
                }
                format!(
                    "greet the user welcome back {}, if they want to upload photos they can do so by clicking on the upload button in the chat box",
                    existing.username
                )
            }
            Err(e) if e.is_not_found() => {
                let created = match self.users.upsert_by_username(&username).await {
                    Ok(user) => user,
                    Err(e) => {
                        tracing::warn!(error = %e, username = %username, "Failed to create user");
                        return "unable to create new user ask to try again".to_string();
                    }
                };
                tracing::info!(user_id = created.id, username = %created.username, "Created new user");
                if let Err(e) = self.remember(&created.username).await {
                    tracing::warn!(error = %e, "Failed to cache active username");
                    return "something went wrong please try again".to_string();
                }
                format!(
                    "created new user {}, welcome them and tell them they can now upload photos with the upload button in the chat box",
                    created.username
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, username = %username, "User lookup failed");
                "please try again later".to_string()
            }
        }
    }

    async fn remember(&self, username: &str) -> crate::store::StoreResult<()> {
        self.cache
            .set(ACTIVE_USERNAME_KEY, username, ACTIVE_USERNAME_TTL)
            .await
    }
}
