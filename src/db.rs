//! Database module
//!
//! Provides persistence for users and their photo references.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Cheap liveness probe for health checks
    pub fn ping(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Insert the user, or touch `updated_at` if the username exists
    pub fn upsert_user(&self, username: &str) -> DbResult<User> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO users (username, is_active, created_at, updated_at)
                 VALUES (?1, 1, ?2, ?2)
                 ON CONFLICT(username) DO UPDATE SET updated_at = excluded.updated_at",
                params![username, now],
            )?;
        }
        self.get_user_by_username(username)
    }

    /// Get user by username
    pub fn get_user_by_username(&self, username: &str) -> DbResult<User> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, username, is_active, created_at, updated_at
             FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    is_active: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    updated_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()?
        .ok_or_else(|| DbError::UserNotFound(username.to_string()))
    }

    /// Count users (for tests and diagnostics)
    #[allow(dead_code)] // Used in tests
    pub fn user_count(&self) -> DbResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    // ==================== Photo Operations ====================

    /// Record a stored photo URL for a user
    pub fn add_photo(&self, user_id: i64, url: &str) -> DbResult<PhotoRecord> {
        let conn = self.lock()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO user_images (user_id, url, is_active, created_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?3)",
            params![user_id, url, now.to_rfc3339()],
        )?;
        Ok(PhotoRecord {
            id: conn.last_insert_rowid(),
            user_id,
            url: url.to_string(),
            created_at: now,
        })
    }

    /// List active photos for a user in upload order
    pub fn list_photos(&self, user_id: i64) -> DbResult<Vec<PhotoRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, url, created_at FROM user_images
             WHERE user_id = ?1 AND is_active = 1 ORDER BY id",
        )?;
        let photos = stmt
            .query_map(params![user_id], |row| {
                Ok(PhotoRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    url: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(photos)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
