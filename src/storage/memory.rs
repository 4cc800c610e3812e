use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::BlobStore;
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct MemoryBlobInner {
    blobs: HashMap<(String, String), StoredBlob>,
    uploads: u64,
    /// Uploads whose key contains this fragment fail.
    fail_on: Option<String>,
}

/// In-process blob store. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<MemoryBlobInner>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes uploads fail for keys containing `fragment`; `""` fails all.
    pub async fn fail_uploads_matching(&self, fragment: Option<&str>) {
        self.inner.write().await.fail_on = fragment.map(str::to_string);
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredBlob> {
        self.inner
            .read()
            .await
            .blobs
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .read()
            .await
            .blobs
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn upload_count(&self) -> u64 {
        self.inner.read().await.uploads
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(fragment) = &inner.fail_on {
            if key.contains(fragment.as_str()) {
                return Err(AppError::UploadError(format!("simulated upload failure for {}", key)));
            }
        }
        inner.blobs.insert(
            (bucket.to_string(), key.to_string()),
            StoredBlob { bytes: bytes.to_vec(), content_type: content_type.to_string() },
        );
        inner.uploads += 1;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, key)
    }
}
