use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{DownloadOutcome, FileRecordResponse, UploadResponse};
use crate::services::hasher::is_content_id;
use crate::AppState;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Fields taken from the `file` part of an upload form
struct UploadForm {
    data: Option<Bytes>,
    file_name: String,
    content_type: String,
}

/// Read the `file` part; a form without one yields `data: None`.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm {
        data: None,
        file_name: String::new(),
        content_type: DEFAULT_MIME.to_string(),
    };

    // Process multipart fields
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to process multipart: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        form.file_name = field.file_name().unwrap_or_default().to_string();
        if let Some(content_type) = field.content_type() {
            form.content_type = content_type.to_string();
        }
        form.data = Some(field.bytes().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read file: {}", e))
        })?);
    }

    Ok(form)
}

/// Upload a file
/// POST /file/upload
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>> {
    let form = read_upload_form(multipart).await?;

    let outcome = state
        .files
        .upload(form.data, form.file_name, form.content_type)
        .await?;

    let response = if outcome.is_degraded() {
        let message = outcome.to_string();
        ApiResponse::with_message(&message, UploadResponse::from(outcome))
    } else {
        ApiResponse::success(UploadResponse::from(outcome))
    };
    Ok(Json(response))
}

/// Download a file by content id
/// GET /file/download/:content_id
pub async fn download_file(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Result<Response> {
    if !is_content_id(&content_id) {
        return Err(AppError::NotFound(format!("File {} not found", content_id)));
    }

    let file = match state.files.download(&content_id).await? {
        DownloadOutcome::Found(file) => file,
        DownloadOutcome::NotFound => {
            return Err(AppError::NotFound(format!("File {} not found", content_id)))
        }
        DownloadOutcome::Unavailable { content_id, reason } => {
            return Err(AppError::Storage(format!(
                "Content {} is unavailable: {}",
                content_id, reason
            )))
        }
    };

    let content_type = file
        .mime_type
        .parse::<mime::Mime>()
        .map(|m| m.to_string())
        .unwrap_or_else(|_| DEFAULT_MIME.to_string());

    let fallback_name = disposition_name(&file.display_name);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", fallback_name),
        )
        .body(Body::from(file.bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Quoted-string safe filename: header values only carry visible ASCII
fn disposition_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}

/// List all files
/// GET /file
pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<FileRecordResponse>>>> {
    let files = state.files.list_all().await?;
    Ok(Json(ApiResponse::success(
        files.into_iter().map(FileRecordResponse::from).collect(),
    )))
}

/// Get a file record by id
/// GET /file/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileRecordResponse>>> {
    let file = state.files.get_by_id(id).await?;
    Ok(Json(ApiResponse::success(file.into())))
}

/// Get a file record by content id
/// GET /file/file-name/:content_id
pub async fn get_file_by_content_id(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Result<Json<ApiResponse<FileRecordResponse>>> {
    if !is_content_id(&content_id) {
        return Err(AppError::NotFound(format!("File {} not found", content_id)));
    }
    let file = state.files.get_by_content_id(&content_id).await?;
    Ok(Json(ApiResponse::success(file.into())))
}

/// Records whose blob is missing
/// GET /file/degraded
pub async fn list_degraded(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<FileRecordResponse>>>> {
    let files = state.files.degraded_records().await?;
    Ok(Json(ApiResponse::success(
        files.into_iter().map(FileRecordResponse::from).collect(),
    )))
}
