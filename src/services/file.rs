use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::error::{AppError, Result};
use crate::metadata::MetadataStore;
use crate::models::{
    download_name, DownloadOutcome, DownloadedFile, FileRecord, NewFileRecord, UploadOutcome,
    UploadState,
};
use crate::services::hasher;
use crate::storage::BlobStore;

/// Coordinates the metadata store and blob store for uploads and downloads.
///
/// Uploads commit metadata first and the blob second. A blob failure after
/// the metadata commit leaves the record in the degraded state, which
/// `degraded_records` reports and a re-upload of the same bytes repairs.
#[derive(Clone)]
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { metadata, blobs }
    }

    /// Store `data` and return its content id, or the degraded outcome when
    /// the blob could not be written.
    pub async fn upload(
        &self,
        data: Option<Bytes>,
        original_name: String,
        mime_type: String,
    ) -> Result<UploadOutcome> {
        let data = data.ok_or(AppError::NullInput)?;

        let content_id = hasher::content_id(&data);
        let mut state = UploadState::Hashed;
        tracing::debug!(
            "Upload {:?}: {} bytes hashed to {}",
            original_name,
            data.len(),
            content_id
        );

        let record = match self.metadata.find_by_content_id(&content_id).await? {
            Some(existing) => {
                if self.blob_exists(&content_id).await {
                    tracing::info!("Content {} already stored, skipping write", content_id);
                    return Ok(UploadOutcome {
                        content_id,
                        state: UploadState::BlobCommitted,
                        record: existing,
                    });
                }
                tracing::warn!("Repairing degraded record {} for {}", existing.id, content_id);
                existing
            }
            None => {
                let candidate = NewFileRecord {
                    original_name,
                    mime_type,
                    size: data.len() as i64,
                    content_id: content_id.clone(),
                };
                self.metadata.insert(candidate).await?
            }
        };
        state = advance(state, UploadState::MetadataCommitted);

        state = match self.blobs.put(&content_id, data).await {
            Ok(()) => advance(state, UploadState::BlobCommitted),
            Err(e) => {
                tracing::error!(
                    "Blob write for {} failed after metadata commit (record {}): {}",
                    content_id,
                    record.id,
                    e
                );
                advance(state, UploadState::Degraded)
            }
        };

        if state == UploadState::BlobCommitted {
            tracing::info!("Stored {} as record {}", content_id, record.id);
        }

        Ok(UploadOutcome {
            content_id,
            state,
            record,
        })
    }

    /// Fetch the content stored under `content_id` together with its
    /// client-facing name and type.
    pub async fn download(&self, content_id: &str) -> Result<DownloadOutcome> {
        let record = match self.metadata.find_by_content_id(content_id).await? {
            Some(record) => record,
            None => return Ok(DownloadOutcome::NotFound),
        };

        let bytes = match self.read_blob(content_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Blob for {} unavailable: {}", content_id, e);
                return Ok(DownloadOutcome::Unavailable {
                    content_id: content_id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        if bytes.len() as i64 != record.size {
            tracing::warn!(
                "Blob {} is {} bytes but record {} says {}",
                content_id,
                bytes.len(),
                record.id,
                record.size
            );
        }

        Ok(DownloadOutcome::Found(DownloadedFile {
            display_name: download_name(content_id, &record.original_name),
            size: bytes.len() as i64,
            mime_type: record.mime_type,
            bytes,
        }))
    }

    /// All metadata records, oldest first
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        self.metadata.list().await
    }

    /// Get a record by id
    pub async fn get_by_id(&self, id: i64) -> Result<FileRecord> {
        self.metadata
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    /// Get the record for a content id
    pub async fn get_by_content_id(&self, content_id: &str) -> Result<FileRecord> {
        self.metadata
            .find_by_content_id(content_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", content_id)))
    }

    /// Records whose blob is missing from the blob store
    pub async fn degraded_records(&self) -> Result<Vec<FileRecord>> {
        let mut degraded = Vec::new();
        for record in self.metadata.list().await? {
            if !self.blobs.exists(&record.content_id).await? {
                degraded.push(record);
            }
        }
        Ok(degraded)
    }

    /// Drain the blob reader fully; the reader is dropped on every path.
    async fn read_blob(&self, content_id: &str) -> Result<Bytes> {
        let mut reader = self.blobs.get(content_id).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// A failed existence check counts as missing so the write is retried
    async fn blob_exists(&self, content_id: &str) -> bool {
        match self.blobs.exists(content_id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("Existence check for {} failed: {}", content_id, e);
                false
            }
        }
    }
}

fn advance(from: UploadState, to: UploadState) -> UploadState {
    tracing::trace!("Upload state {} -> {}", from.as_str(), to.as_str());
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::NOT_UPLOADED;
    use crate::storage::{BlobReader, MemoryStorage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Memory blob store that counts calls and can be told to fail
    #[derive(Default)]
    struct RecordingBlobs {
        inner: MemoryStorage,
        puts: AtomicUsize,
        gets: AtomicUsize,
        fail_put: AtomicBool,
        fail_get: AtomicBool,
    }

    impl RecordingBlobs {
        fn calls(&self) -> usize {
            self.puts.load(Ordering::SeqCst) + self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobStore for RecordingBlobs {
        async fn put(&self, key: &str, data: Bytes) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(AppError::Storage("blob backend down".to_string()));
            }
            self.inner.put(key, data).await
        }

        async fn get(&self, key: &str) -> Result<BlobReader> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(AppError::Storage("blob backend down".to_string()));
            }
            self.inner.get(key).await
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }

        fn storage_type(&self) -> &'static str {
            "recording"
        }
    }

    /// Metadata store whose every call fails
    struct BrokenMetadata {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataStore for BrokenMetadata {
        async fn insert(&self, _record: NewFileRecord) -> Result<FileRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Database(sqlx::Error::PoolClosed))
        }

        async fn find_by_id(&self, _id: i64) -> Result<Option<FileRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Database(sqlx::Error::PoolClosed))
        }

        async fn find_by_content_id(&self, _content_id: &str) -> Result<Option<FileRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<FileRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Database(sqlx::Error::PoolClosed))
        }
    }

    /// Database whose content-id lookup always misses
    struct StaleLookup {
        inner: Arc<Database>,
    }

    #[async_trait]
    impl MetadataStore for StaleLookup {
        async fn insert(&self, record: NewFileRecord) -> Result<FileRecord> {
            self.inner.insert(record).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_content_id(&self, _content_id: &str) -> Result<Option<FileRecord>> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<FileRecord>> {
            self.inner.list().await
        }
    }

    async fn service() -> (FileService, Arc<Database>, Arc<RecordingBlobs>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let blobs = Arc::new(RecordingBlobs::default());
        (FileService::new(db.clone(), blobs.clone()), db, blobs)
    }

    async fn upload(svc: &FileService, data: &'static [u8], name: &str) -> UploadOutcome {
        svc.upload(
            Some(Bytes::from_static(data)),
            name.to_string(),
            "text/plain".to_string(),
        )
        .await
        .unwrap()
    }

    fn found(outcome: DownloadOutcome) -> DownloadedFile {
        match outcome {
            DownloadOutcome::Found(file) => file,
            other => panic!("expected a file, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_hello() {
        let (svc, _, blobs) = service().await;

        let outcome = upload(&svc, b"Hello", "test.txt").await;
        let id = outcome.to_string();
        assert!(hasher::is_content_id(&id));
        assert_eq!(outcome.state, UploadState::BlobCommitted);
        assert_eq!(blobs.puts.load(Ordering::SeqCst), 1);

        let record = svc.get_by_content_id(&id).await.unwrap();
        assert_eq!(record.size, 5);
        assert_eq!(record.mime_type, "text/plain");
        assert_eq!(record.original_name, "test.txt");
        assert_eq!(svc.get_by_id(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let (svc, _, _) = service().await;

        let id = upload(&svc, b"test content", "707.png").await.to_string();
        let file = found(svc.download(&id).await.unwrap());
        assert_eq!(&file.bytes[..], b"test content");
        assert_eq!(file.display_name, format!("{}.png", id));
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, 12);
    }

    #[tokio::test]
    async fn test_empty_content_roundtrip() {
        let (svc, _, blobs) = service().await;

        let outcome = upload(&svc, b"", "empty").await;
        assert_eq!(outcome.content_id, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(outcome.record.size, 0);
        assert_eq!(blobs.puts.load(Ordering::SeqCst), 1);

        let file = found(svc.download(&outcome.content_id).await.unwrap());
        assert!(file.bytes.is_empty());
        assert_eq!(file.display_name, outcome.content_id);
    }

    #[tokio::test]
    async fn test_null_input_touches_nothing() {
        let metadata = Arc::new(BrokenMetadata {
            calls: AtomicUsize::new(0),
        });
        let blobs = Arc::new(RecordingBlobs::default());
        let svc = FileService::new(metadata.clone(), blobs.clone());

        let err = svc
            .upload(None, "test.txt".to_string(), "text/plain".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NullInput));
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
        assert_eq!(blobs.calls(), 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_skips_blob() {
        let blobs = Arc::new(RecordingBlobs::default());
        let svc = FileService::new(
            Arc::new(BrokenMetadata {
                calls: AtomicUsize::new(0),
            }),
            blobs.clone(),
        );

        let err = svc
            .upload(
                Some(Bytes::from_static(b"Hello")),
                "test.txt".to_string(),
                "text/plain".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(blobs.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blob_failure_degrades() {
        let (svc, _, blobs) = service().await;
        blobs.fail_put.store(true, Ordering::SeqCst);

        let outcome = upload(&svc, b"Hello", "test.txt").await;
        assert_eq!(outcome.to_string(), NOT_UPLOADED);
        assert!(outcome.is_degraded());

        // metadata is committed, the blob is not
        let record = svc.get_by_content_id(&outcome.content_id).await.unwrap();
        assert_eq!(record.size, 5);
        assert!(!blobs.exists(&outcome.content_id).await.unwrap());

        let degraded = svc.degraded_records().await.unwrap();
        assert_eq!(degraded, vec![record]);

        assert!(matches!(
            svc.download(&outcome.content_id).await.unwrap(),
            DownloadOutcome::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_reupload_repairs_degraded_record() {
        let (svc, db, blobs) = service().await;
        blobs.fail_put.store(true, Ordering::SeqCst);
        let first = upload(&svc, b"Hello", "test.txt").await;
        assert!(first.is_degraded());

        blobs.fail_put.store(false, Ordering::SeqCst);
        let second = upload(&svc, b"Hello", "renamed.txt").await;
        assert_eq!(second.state, UploadState::BlobCommitted);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.original_name, "test.txt");

        assert!(svc.degraded_records().await.unwrap().is_empty());
        assert_eq!(db.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_deduplicated() {
        let (svc, _, blobs) = service().await;

        let first = upload(&svc, b"same", "a.txt").await;
        let second = upload(&svc, b"same", "b.txt").await;
        assert_eq!(first.content_id, second.content_id);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(blobs.puts.load(Ordering::SeqCst), 1);
        assert_eq!(svc.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_racing_insert_surfaces_conflict() {
        // both uploads pass the dedup lookup before either insert lands
        let db = Arc::new(Database::in_memory().await.unwrap());
        let blobs = Arc::new(RecordingBlobs::default());
        let svc = FileService::new(Arc::new(StaleLookup { inner: db.clone() }), blobs.clone());

        let winner = upload(&svc, b"raced", "winner.txt").await;
        assert_eq!(winner.state, UploadState::BlobCommitted);

        let err = svc
            .upload(
                Some(Bytes::from_static(b"raced")),
                "loser.txt".to_string(),
                "text/plain".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(blobs.puts.load(Ordering::SeqCst), 1);

        let records = db.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_name, "winner.txt");
    }

    #[tokio::test]
    async fn test_download_unknown_skips_blob_store() {
        let (svc, _, blobs) = service().await;

        assert!(matches!(
            svc.download("unknown").await.unwrap(),
            DownloadOutcome::NotFound
        ));
        assert_eq!(blobs.calls(), 0);
    }

    #[tokio::test]
    async fn test_download_backend_failure_is_not_an_error() {
        let (svc, _, blobs) = service().await;
        let id = upload(&svc, b"abc123", "test.png").await.content_id;
        blobs.fail_get.store(true, Ordering::SeqCst);

        match svc.download(&id).await.unwrap() {
            DownloadOutcome::Unavailable { content_id, reason } => {
                assert_eq!(content_id, id);
                assert!(reason.contains("blob backend down"));
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_misses() {
        let (svc, _, _) = service().await;
        assert!(matches!(svc.get_by_id(42).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            svc.get_by_content_id("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
