//! Filesystem-backed photo object store
//!
//! Objects are written under a root directory and served statically at
//! `<public_url>/photos/<key>`; the URL index lives in the database.

use super::{PhotoStore, StoreError, StoreResult};
use crate::db::Database;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct LocalPhotoStore {
    db: Database,
    root: PathBuf,
    public_url: String,
}

impl LocalPhotoStore {
    pub fn new(db: Database, root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            db,
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/photos/{key}", self.public_url)
    }
}

/// Reduce a client-supplied filename to a single safe path component
fn object_key(filename: &str) -> Option<String> {
    let name = Path::new(filename).file_name()?.to_str()?;
    let key: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() || key.chars().all(|c| c == '.') {
        None
    } else {
        Some(key)
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn store_upload(
        &self,
        owner_id: i64,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        let key = object_key(filename)
            .ok_or_else(|| StoreError::InvalidName(filename.to_string()))?;

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&key), data).await?;

        let url = self.object_url(&key);
        self.db.add_photo(owner_id, &url)?;
        tracing::info!(owner_id, key = %key, content_type, bytes = data.len(), "Stored photo");
        Ok(url)
    }

    async fn list_by_owner(&self, owner_id: i64) -> StoreResult<Vec<String>> {
        Ok(self
            .db
            .list_photos(owner_id)?
            .into_iter()
            .map(|photo| photo.url)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_strips_paths() {
        assert_eq!(object_key("cat.jpg").as_deref(), Some("cat.jpg"));
        assert_eq!(object_key("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(object_key("my photo.jpg").as_deref(), Some("my_photo.jpg"));
        assert_eq!(object_key(".."), None);
        assert_eq!(object_key(""), None);
    }

    #[tokio::test]
    async fn test_store_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let owner = db.upsert_user("alice").unwrap();
        let store = LocalPhotoStore::new(db, dir.path().join("photos"), "http://localhost:8765/");

        let url = store
            .store_upload(owner.id, b"jpegbytes", "cat.jpg-1234", "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8765/photos/cat.jpg-1234");
        assert_eq!(
            std::fs::read(store.root().join("cat.jpg-1234")).unwrap(),
            b"jpegbytes"
        );

        assert_eq!(store.list_by_owner(owner.id).await.unwrap(), vec![url]);
        assert!(store.list_by_owner(owner.id + 1).await.unwrap().is_empty());
    }
}
