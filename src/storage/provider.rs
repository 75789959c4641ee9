use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::{AppError, Result};

/// Readable handle on a stored blob. Dropping it releases the backend resource.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Key/value object storage addressed by content id
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`. Repeating a put with identical bytes is a no-op.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Open the blob under `key`; `AppError::NotFound` when it is absent
    async fn get(&self, key: &str) -> Result<BlobReader>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}

/// Reject keys that could escape the backend namespace.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key == "."
        || key.contains("..")
    {
        return Err(AppError::BadRequest(format!("Invalid blob key: {:?}", key)));
    }
    Ok(())
}
