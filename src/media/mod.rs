//! File upload and download service backed by an object store.

mod handlers;
mod memory;
mod s3;
mod store;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;

pub use handlers::{
    DEFAULT_PRESIGN_EXPIRY, MAX_PRESIGN_EXPIRY_SECS, is_image, object_key,
};
pub use memory::MemoryStore;
pub use s3::{S3Settings, S3Store, public_read_policy};
pub use store::{DEFAULT_CONTENT_TYPE, ObjectInfo, ObjectStore, StoreError, StoredObject};

/// Default per-file upload limit: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// Most files accepted by a single batch upload.
pub const MAX_BATCH_FILES: usize = 10;

/// Room for multipart boundaries and part headers on top of the file data.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct MediaState {
    pub store: Arc<dyn ObjectStore>,
    pub max_file_size: usize,
}

/// Create the media API router, mounted under `/api/v1`.
pub fn create_media_router(state: MediaState) -> Router {
    let single_limit = state.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let batch_limit = state
        .max_file_size
        .saturating_mul(MAX_BATCH_FILES)
        .saturating_add(MULTIPART_OVERHEAD);

    let upload_router = Router::new()
        .route("/upload", post(handlers::upload_file))
        .layer(DefaultBodyLimit::max(single_limit))
        .with_state(state.clone());

    let batch_router = Router::new()
        .route("/upload/multiple", post(handlers::upload_multiple))
        .layer(DefaultBodyLimit::max(batch_limit))
        .with_state(state.clone());

    let read_router = Router::new()
        .route(
            "/file/{filename}",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route("/download/{filename}", get(handlers::download_file))
        .route("/thumbnail/{filename}", get(handlers::get_thumbnail))
        .route("/info/{filename}", get(handlers::file_info))
        .route("/presign/{filename}", get(handlers::presign))
        .route("/files", get(handlers::list_files))
        .with_state(state);

    Router::new()
        .merge(upload_router)
        .merge(batch_router)
        .merge(read_router)
}
