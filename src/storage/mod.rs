pub mod cos;
pub mod local;
pub mod memory;
pub mod provider;

pub use cos::CosStorage;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use provider::*;

use std::sync::Arc;

use crate::config::{BlobBackend, StorageConfig};
use crate::error::Result;

/// Build the blob store selected by configuration
pub fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        BlobBackend::Local => Arc::new(LocalStorage::new(&config.local_path)),
        BlobBackend::Memory => Arc::new(MemoryStorage::new()),
        BlobBackend::Cos => Arc::new(CosStorage::new(&config.cos)?),
    };
    tracing::info!("Blob store: {}", store.storage_type());
    Ok(store)
}
