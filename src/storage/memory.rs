use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::{validate_key, BlobReader, BlobStore};

/// Process-local blob store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        validate_key(key)?;
        self.blobs
            .write()
            .await
            .entry(key.to_string())
            .or_insert(data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobReader> {
        validate_key(key)?;
        let data = self
            .blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Blob not found: {}", key)))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.blobs.read().await.contains_key(key))
    }

    fn storage_type(&self) -> &'static str {
        "memory"
    }
}
