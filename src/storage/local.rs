use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::BlobStore;
use crate::errors::{AppError, Result};

/// Stores blobs as files under a root directory; the HTTP server serves
/// that directory at `base_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() || bucket.is_empty() {
            return Err(AppError::UploadError(format!("Invalid blob key '{}/{}'", bucket, key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::UploadError(format!("Failed to create blob directory: {}", e)))?;
        }

        // Write beside the target then rename so readers never see a partial file.
        let staging = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| AppError::UploadError(format!("Failed to write blob: {}", e)))?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(AppError::UploadError(format!("Failed to store blob: {}", e)));
        }

        debug!(action = "blob_uploaded", bucket = %bucket, key = %key, content_type = %content_type, size = bytes.len());
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upload_writes_file_and_overwrites() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:8080/uploads/");

        store.upload("verifications", "u1/id-abc.jpg", b"first", "image/jpeg").await.unwrap();
        store.upload("verifications", "u1/id-abc.jpg", b"second", "image/jpeg").await.unwrap();

        let stored = std::fs::read(dir.path().join("verifications/u1/id-abc.jpg")).unwrap();
        assert_eq!(stored, b"second");
    }

    #[test]
    fn public_url_joins_base_bucket_and_key() {
        let store = LocalBlobStore::new("/tmp/blobs", "http://localhost:8080/uploads/");
        assert_eq!(
            store.public_url("verifications", "u1/id-abc.jpg"),
            "http://localhost:8080/uploads/verifications/u1/id-abc.jpg"
        );
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost");
        let err = store.upload("verifications", "../escape.jpg", b"x", "image/jpeg").await.unwrap_err();
        assert!(matches!(err, AppError::UploadError(_)));
    }
}
