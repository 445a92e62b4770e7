//! File storage abstraction for uploaded attachments and avatars.

use std::path::PathBuf;

use crate::{AppError, AppResult};

/// Metadata for a stored blob.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Storage key (path relative to the storage root).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a blob under the given key.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredBlob>;

    /// Delete a blob.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Check if a blob exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredBlob> {
        let path = self.base_path.join(key);

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        Ok(StoredBlob {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.base_path.join(key);
        Ok(path.exists())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_joins_cleanly() {
        let storage = LocalStorage::new(PathBuf::from("/tmp/files"), "/files/".to_string());
        assert_eq!(storage.public_url("ab/cd.png"), "/files/ab/cd.png");
    }

    #[tokio::test]
    async fn test_put_and_exists_roundtrip() {
        let dir = std::env::temp_dir().join(format!("ripple-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "/files".to_string());

        let blob = storage
            .put("avatars/test.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(blob.size, 9);
        assert_eq!(blob.url, "/files/avatars/test.png");
        assert!(storage.exists("avatars/test.png").await.unwrap());

        storage.delete("avatars/test.png").await.unwrap();
        assert!(!storage.exists("avatars/test.png").await.unwrap());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
