use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::{validate_key, BlobReader, BlobStore};

/// Local file system blob store.
///
/// Blobs live at `<base>/<first two key chars>/<key>`.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn get_full_path(&self, key: &str) -> PathBuf {
        match key.get(..2) {
            Some(shard) if key.len() > 2 => self.base_path.join(shard).join(key),
            _ => self.base_path.join(key),
        }
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        validate_key(key)?;
        let full_path = self.get_full_path(key);

        if fs::try_exists(&full_path).await? {
            tracing::debug!("Blob {} already stored at {:?}", key, full_path);
            return Ok(());
        }

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write next to the target, then rename into place
        let temp_path = full_path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &full_path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::Storage(format!(
                "Failed to write blob {}: {}",
                key, e
            )));
        }

        tracing::debug!("Saved blob to {:?} ({} bytes)", full_path, data.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobReader> {
        validate_key(key)?;
        let full_path = self.get_full_path(key);

        let file = fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", key))
            } else {
                AppError::Storage(format!("Failed to open blob: {}", e))
            }
        })?;

        Ok(Box::new(file))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(fs::try_exists(self.get_full_path(key)).await?)
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
