//! Collaborators consumed by the tool dispatcher and the upload endpoint
//!
//! These traits keep the dispatch logic independent of the concrete
//! persistence, object storage and cache implementations.

mod cache;
mod photos;

pub use cache::MemoryCache;
pub use photos::LocalPhotoStore;

use crate::db::{Database, DbError, User};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Database(DbError),
    #[error("Invalid object name: {0}")]
    InvalidName(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UserNotFound(name) => StoreError::NotFound(name),
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User records keyed by username
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create the user if absent; returns the stored record
    async fn upsert_by_username(&self, username: &str) -> StoreResult<User>;

    /// Fails with `StoreError::NotFound` when the username is unknown
    async fn fetch_by_username(&self, username: &str) -> StoreResult<User>;
}

/// Binary photo objects plus their per-owner URL index
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Persist one object and return its public URL
    async fn store_upload(
        &self,
        owner_id: i64,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> StoreResult<String>;

    /// URLs of everything stored for the owner, oldest first
    async fn list_by_owner(&self, owner_id: i64) -> StoreResult<Vec<String>>;
}

/// String key-value cache with per-entry expiry
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Fails with `StoreError::NotFound` when absent or expired
    async fn get(&self, key: &str) -> StoreResult<String>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn upsert_by_username(&self, username: &str) -> StoreResult<User> {
        (**self).upsert_by_username(username).await
    }

    async fn fetch_by_username(&self, username: &str) -> StoreResult<User> {
        (**self).fetch_by_username(username).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl UserDirectory for Database {
    async fn upsert_by_username(&self, username: &str) -> StoreResult<User> {
        Ok(self.upsert_user(username)?)
    }

    async fn fetch_by_username(&self, username: &str) -> StoreResult<User> {
        Ok(self.get_user_by_username(username)?)
    }
}
