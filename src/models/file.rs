use bytes::Bytes;
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;

/// Caller-facing result of an upload whose blob could not be written
pub const NOT_UPLOADED: &str = "File is not uploaded!";

/// Stored metadata for one uploaded file
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub content_id: String,
    pub added_time: String,
}

/// Insert candidate; the store assigns `id` and `added_time`
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub content_id: String,
}

/// File record as returned over the API
#[derive(Debug, Clone, Serialize)]
pub struct FileRecordResponse {
    pub id: i64,
    pub content_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub added_time: String,
}

impl From<FileRecord> for FileRecordResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            content_id: record.content_id,
            original_name: record.original_name,
            mime_type: record.mime_type,
            size: record.size,
            added_time: record.added_time,
        }
    }
}

/// Progress of a single upload through the metadata-then-blob commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Identifier computed, nothing durable yet
    Hashed,
    /// Metadata row written, blob not yet written
    MetadataCommitted,
    /// Metadata and blob both durable
    BlobCommitted,
    /// Metadata durable, blob write failed
    Degraded,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Hashed => "hashed",
            UploadState::MetadataCommitted => "metadata_committed",
            UploadState::BlobCommitted => "blob_committed",
            UploadState::Degraded => "degraded",
        }
    }
}

/// Terminal outcome of an upload: either fully committed or degraded.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub content_id: String,
    pub state: UploadState,
    pub record: FileRecord,
}

impl UploadOutcome {
    pub fn is_degraded(&self) -> bool {
        self.state == UploadState::Degraded
    }
}

/// The identifier on success, the `NOT_UPLOADED` sentinel when degraded.
impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_degraded() {
            f.write_str(NOT_UPLOADED)
        } else {
            f.write_str(&self.content_id)
        }
    }
}

/// Upload response body
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub result: String,
    pub content_id: String,
    pub record_id: i64,
    pub state: UploadState,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            result: outcome.to_string(),
            content_id: outcome.content_id,
            record_id: outcome.record.id,
            state: outcome.state,
        }
    }
}

/// Fully buffered download ready to hand to a client
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Bytes,
    pub display_name: String,
    pub mime_type: String,
    pub size: i64,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Found(DownloadedFile),
    /// No metadata record for the identifier
    NotFound,
    /// Record exists but its blob could not be read
    Unavailable { content_id: String, reason: String },
}

/// Client-facing download name: the identifier plus the extension of the
/// original name (from the last `.`), or the bare identifier.
pub fn download_name(content_id: &str, original_name: &str) -> String {
    match original_name.rfind('.') {
        Some(idx) => format!("{}{}", content_id, &original_name[idx..]),
        None => content_id.to_string(),
    }
}
