//! Media HTTP handlers.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Multipart, Path, Query, State, multipart::Field, multipart::MultipartError},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::MediaState;
use super::store::{DEFAULT_CONTENT_TYPE, ObjectInfo, StoreError};
use crate::api::ApiError;

/// Default lifetime of a presigned URL.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// Longest presigned URL lifetime S3 accepts (7 days).
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

const MIB: usize = 1024 * 1024;

fn store_error(context: &str, e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::not_found("File not found"),
        e => ApiError::internal_error(context, e),
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::debug!(error = %e.body_text(), "Rejected multipart body");
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request("Request body too large")
    } else {
        ApiError::bad_request("Invalid multipart form")
    }
}

/// Object key for an upload: a fresh UUID plus the original extension.
pub fn object_key(original_name: &str) -> String {
    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}{}", uuid::Uuid::new_v4(), extension)
}

/// True if the name carries one of the image extensions served as thumbnails.
pub fn is_image(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// A file part read from a multipart body.
struct UploadPart {
    original_name: String,
    content_type: String,
    /// `None` when the part exceeded the size limit
    data: Option<Bytes>,
}

/// Read a file part, stopping once it grows past `max_size`.
async fn read_part(mut field: Field<'_>, max_size: usize) -> Result<UploadPart, ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .filter(|ct| !ct.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > max_size {
            return Ok(UploadPart {
                original_name,
                content_type,
                data: None,
            });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(UploadPart {
        original_name,
        content_type,
        data: Some(Bytes::from(buffer)),
    })
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    original_name: String,
    size: usize,
    url: String,
}

pub(super) async fn upload_file(
    State(state): State<MediaState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut part = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            part = Some(read_part(field, state.max_file_size).await?);
            break;
        }
    }

    let part = part.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let data = part.data.ok_or_else(|| {
        ApiError::bad_request(format!(
            "File too large. Max size: {} MB",
            state.max_file_size / MIB
        ))
    })?;

    let filename = object_key(&part.original_name);
    let size = data.len();

    state
        .store
        .put(&filename, data, &part.content_type)
        .await
        .map_err(|e| store_error("Failed to upload file", e))?;

    tracing::info!(filename = %filename, size, "File uploaded");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        url: state.store.public_url(&filename),
        filename,
        original_name: part.original_name,
        size,
    }))
}

/// Outcome for one file of a batch upload.
#[derive(Serialize)]
#[serde(untagged)]
enum UploadResult {
    Stored {
        filename: String,
        original_name: String,
        size: usize,
        url: String,
        success: bool,
    },
    Failed {
        filename: String,
        success: bool,
        error: &'static str,
    },
}

impl UploadResult {
    fn failed(original_name: String, error: &'static str) -> Self {
        UploadResult::Failed {
            filename: original_name,
            success: false,
            error,
        }
    }
}

#[derive(Serialize)]
struct UploadMultipleResponse {
    message: &'static str,
    files: Vec<UploadResult>,
}

pub(super) async fn upload_multiple(
    State(state): State<MediaState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut results = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("files") {
            continue;
        }

        let part = read_part(field, state.max_file_size).await?;
        let Some(data) = part.data else {
            results.push(UploadResult::failed(part.original_name, "File too large"));
            continue;
        };

        let filename = object_key(&part.original_name);
        let size = data.len();

        if let Err(e) = state.store.put(&filename, data, &part.content_type).await {
            tracing::error!(filename = %filename, error = %e, "Failed to upload file");
            results.push(UploadResult::failed(part.original_name, "Failed to upload"));
            continue;
        }

        results.push(UploadResult::Stored {
            url: state.store.public_url(&filename),
            filename,
            original_name: part.original_name,
            size,
            success: true,
        });
    }

    if results.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    Ok(Json(UploadMultipleResponse {
        message: "Upload completed",
        files: results,
    }))
}

async fn stream_file(
    state: &MediaState,
    filename: &str,
    disposition: Option<HeaderValue>,
) -> Result<Response, ApiError> {
    let object = state
        .store
        .get(filename)
        .await
        .map_err(|e| store_error("Failed to read file", e))?;

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let mut response = Body::from_stream(object.body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.size));
    if let Some(disposition) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}

pub(super) async fn get_file(
    State(state): State<MediaState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    stream_file(&state, &filename, None).await
}

pub(super) async fn download_file(
    State(state): State<MediaState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", filename))
        .map_err(|_| ApiError::bad_request("Invalid filename"))?;
    stream_file(&state, &filename, Some(disposition)).await
}

/// Serves the original image; no resizing is done.
pub(super) async fn get_thumbnail(
    State(state): State<MediaState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if !is_image(&filename) {
        return Err(ApiError::bad_request("File is not an image"));
    }
    stream_file(&state, &filename, None).await
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub(super) async fn delete_file(
    State(state): State<MediaState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .delete(&filename)
        .await
        .map_err(|e| ApiError::internal_error("Failed to delete file", e))?;

    tracing::info!(filename = %filename, "File deleted");

    Ok(Json(MessageResponse {
        message: "File deleted successfully",
    }))
}

#[derive(Deserialize)]
pub(super) struct ListQuery {
    #[serde(default)]
    prefix: String,
}

#[derive(Serialize)]
struct ListResponse {
    files: Vec<ObjectInfo>,
    count: usize,
}

pub(super) async fn list_files(
    State(state): State<MediaState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let files = state
        .store
        .list(&query.prefix)
        .await
        .map_err(|e| store_error("Failed to list files", e))?;

    Ok(Json(ListResponse {
        count: files.len(),
        files,
    }))
}

#[derive(Serialize)]
struct FileInfoResponse {
    #[serde(flatten)]
    info: ObjectInfo,
    url: String,
}

pub(super) async fn file_info(
    State(state): State<MediaState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .store
        .stat(&filename)
        .await
        .map_err(|e| store_error("Failed to stat file", e))?;

    Ok(Json(FileInfoResponse {
        url: state.store.public_url(&info.name),
        info,
    }))
}

#[derive(Deserialize)]
pub(super) struct PresignQuery {
    expiry: Option<u64>,
}

#[derive(Serialize)]
struct PresignResponse {
    url: String,
    /// Unix timestamp at which the URL stops working
    expires: u64,
}

pub(super) async fn presign(
    State(state): State<MediaState>,
    Path(filename): Path<String>,
    Query(query): Query<PresignQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let expiry = match query.expiry {
        None => DEFAULT_PRESIGN_EXPIRY,
        Some(secs) if (1..=MAX_PRESIGN_EXPIRY_SECS).contains(&secs) => Duration::from_secs(secs),
        Some(_) => {
            return Err(ApiError::bad_request(format!(
                "Expiry must be between 1 and {} seconds",
                MAX_PRESIGN_EXPIRY_SECS
            )));
        }
    };

    // Stores sign without a round trip, so check the object first
    state
        .store
        .stat(&filename)
        .await
        .map_err(|e| store_error("Failed to stat file", e))?;

    let url = state
        .store
        .presign_get(&filename, expiry)
        .await
        .map_err(|e| store_error("Failed to generate URL", e))?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ApiError::internal_error("System clock before Unix epoch", e))?;

    Ok(Json(PresignResponse {
        url,
        expires: (now + expiry).as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_keeps_extension() {
        let key = object_key("photo.final.PNG");
        assert!(key.ends_with(".PNG"));
        assert_eq!(key.len(), 36 + ".PNG".len());

        let key = object_key("README");
        assert_eq!(key.len(), 36);
        assert!(uuid::Uuid::parse_str(&key).is_ok());
    }

    #[test]
    fn test_object_key_unique() {
        assert_ne!(object_key("a.txt"), object_key("a.txt"));
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("a.jpg"));
        assert!(is_image("a.JPEG"));
        assert!(is_image("a.png"));
        assert!(is_image("a.gif"));
        assert!(!is_image("a.webp"));
        assert!(!is_image("a.pdf"));
        assert!(!is_image("png"));
    }
}
