//! `FetchPhotos` - list a user's stored photo URLs
//!
//! Absence of a user or of photos is reported as text the assistant can
//! relay, never as a dispatch error.

use super::{username_schema, FetchPhotosArgs, ToolFunction};
use crate::llm::ToolDefinition;
use crate::store::{PhotoStore, UserDirectory};
use std::sync::Arc;

pub const USER_NOT_FOUND: &str = "username not found ask to create a new user to upload photos";
pub const NO_PHOTOS: &str = "photos not found ask to upload photos";
pub const LOOKUP_FAILED: &str = "unable to fetch photos right now, ask to try again later";

pub struct FetchPhotosTool {
    users: Arc<dyn UserDirectory>,
    photos: Arc<dyn PhotoStore>,
}

impl FetchPhotosTool {
    pub fn new(users: Arc<dyn UserDirectory>, photos: Arc<dyn PhotoStore>) -> Self {
        Self { users, photos }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: ToolFunction::FetchPhotos.name().to_string(),
            description: "fetches photos for a given username".to_string(),
            input_schema: username_schema(),
        }
    }

    pub async fn run(&self, args: FetchPhotosArgs) -> String {
        let user = match self.users.fetch_by_username(&args.username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return USER_NOT_FOUND.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, username = %args.username, "User lookup failed");
                return LOOKUP_FAILED.to_string();
            }
        };

        match self.photos.list_by_owner(user.id).await {
            Ok(urls) if urls.is_empty() => NO_PHOTOS.to_string(),
            Ok(urls) => urls.join("\n"),
            Err(e) => {
                tracing::warn!(error = %e, user_id = user.id, "Photo listing failed");
                LOOKUP_FAILED.to_string()
            }
        }
    }
}
