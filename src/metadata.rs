//! Metadata store: one durable row per distinct content id.

use async_trait::async_trait;
use chrono::Utc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord};

/// Durable record of uploads, unique on `content_id`.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a new record. A second record with the same `content_id`
    /// fails with [`AppError::Conflict`].
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord>;

    /// Look up a record by its store-assigned id
    async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>>;

    /// Look up the record for a content id, if one was ever inserted
    async fn find_by_content_id(&self, content_id: &str) -> Result<Option<FileRecord>>;

    /// All records in insertion order
    async fn list(&self) -> Result<Vec<FileRecord>>;
}

#[async_trait]
impl MetadataStore for Database {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord> {
        if record.size < 0 {
            return Err(AppError::BadRequest("File size cannot be negative".to_string()));
        }

        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO attachments (original_name, mime_type, size, content_id, added_time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.original_name)
        .bind(&record.mime_type)
        .bind(record.size)
        .bind(&record.content_id)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::from_insert(e, &record.content_id))?;

        Ok(FileRecord {
            id: result.last_insert_rowid(),
            original_name: record.original_name,
            mime_type: record.mime_type,
            size: record.size,
            content_id: record.content_id,
            added_time: now,
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let record: Option<FileRecord> = sqlx::query_as("SELECT * FROM attachments WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(record)
    }

    async fn find_by_content_id(&self, content_id: &str) -> Result<Option<FileRecord>> {
        let record: Option<FileRecord> = sqlx::query_as("SELECT * FROM attachments WHERE content_id = ?")
            .bind(content_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        let records: Vec<FileRecord> = sqlx::query_as("SELECT * FROM attachments ORDER BY id ASC")
            .fetch_all(self.pool())
            .await?;
        Ok(records)
    }
}
