use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;

use crate::config::CosConfig;
use crate::error::{AppError, Result};
use crate::storage::{validate_key, BlobReader, BlobStore};

use super::client::Client;

/// Blob store backed by a COS bucket
pub struct CosStorage {
    base_path: String,
    client: Client,
}

impl CosStorage {
    pub fn new(config: &CosConfig) -> Result<Self> {
        let client = Client::new(config)?;
        Ok(Self {
            base_path: config.base_path.clone(),
            client,
        })
    }

    /// Get the full object key with base path
    fn get_object_key(&self, key: &str) -> String {
        if self.base_path.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.base_path.trim_matches('/'), key)
        }
    }
}

#[async_trait]
impl BlobStore for CosStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        validate_key(key)?;
        let object_key = self.get_object_key(key);
        let size = data.len();

        let res = self.client.put_object_binary(data, &object_key).await;
        if !res.is_success() {
            return Err(AppError::Storage(format!(
                "COS upload failed: [{}] {}",
                res.error_no, res.error_message
            )));
        }

        tracing::info!(
            "Uploaded to COS: {}/{} ({} bytes)",
            self.client.get_host(),
            object_key,
            size
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobReader> {
        validate_key(key)?;
        let object_key = self.get_object_key(key);

        let res = self.client.get_object_binary(&object_key).await;
        if res.is_not_found() {
            return Err(AppError::NotFound(format!("Object not found: {}", key)));
        }
        if !res.is_success() {
            return Err(AppError::Storage(format!(
                "COS download failed: [{}] {}",
                res.error_no, res.error_message
            )));
        }

        Ok(Box::new(Cursor::new(Bytes::from(res.result))))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let object_key = self.get_object_key(key);

        let res = self.client.head_object(&object_key).await;
        if res.is_not_found() {
            return Ok(false);
        }
        if !res.is_success() {
            return Err(AppError::Storage(format!(
                "COS head failed: [{}] {}",
                res.error_no, res.error_message
            )));
        }
        Ok(true)
    }

    fn storage_type(&self) -> &'static str {
        "cos"
    }
}
