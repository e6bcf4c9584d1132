//! HTTP surface: chat WebSocket, registration, photo upload, health

mod handlers;
mod types;
mod ws;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::llm::CompletionService;
use crate::relay::BroadcastRelay;
use crate::session::{SessionContext, TurnSettings};
use crate::store::{KeyValueCache, PhotoStore, UserDirectory};
use crate::tools::ToolDispatcher;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub users: Arc<dyn UserDirectory>,
    pub photos: Arc<dyn PhotoStore>,
    pub cache: Arc<dyn KeyValueCache>,
    pub photo_dir: PathBuf,
    /// Handed to each chat session on upgrade
    pub session: SessionContext,
}

/// Collaborators needed to build an `AppState`
pub struct Services {
    pub db: Database,
    pub photos: Arc<dyn PhotoStore>,
    pub cache: Arc<dyn KeyValueCache>,
    pub completions: Arc<dyn CompletionService>,
    pub relay: BroadcastRelay,
}

impl AppState {
    pub fn new(
        services: Services,
        photo_dir: PathBuf,
        persona: Vec<String>,
        settings: TurnSettings,
    ) -> Self {
        let users: Arc<dyn UserDirectory> = Arc::new(services.db.clone());
        let dispatcher = ToolDispatcher::new(
            users.clone(),
            services.photos.clone(),
            services.cache.clone(),
        );

        Self {
            db: services.db,
            users,
            photos: services.photos,
            cache: services.cache,
            photo_dir,
            session: SessionContext {
                completions: services.completions,
                dispatcher: Arc::new(dispatcher),
                relay: services.relay,
                persona: Arc::from(persona),
                settings,
            },
        }
    }

    pub fn relay(&self) -> &BroadcastRelay {
        &self.session.relay
    }
}
