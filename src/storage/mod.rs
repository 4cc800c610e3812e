//! Blob Store: durable storage for uploaded images with URL retrieval.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::errors::Result;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` at `bucket/key`, replacing whatever was there.
    async fn upload(&self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// The URL under which `bucket/key` is served.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}
