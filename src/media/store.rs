//! Object store abstraction for the media service.

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use std::io;
use std::time::Duration;

/// Content type used when an upload does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// RFC 3339 timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// An object opened for reading.
pub struct StoredObject {
    pub content_type: String,
    pub size: u64,
    pub body: BoxStream<'static, Result<Bytes, io::Error>>,
}

/// Storage backend for uploaded files, keyed by object name.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Open an object for streaming.
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    async fn stat(&self, key: &str) -> Result<ObjectInfo, StoreError>;

    /// All objects whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Time-limited download URL. Signing happens locally, so the key is not
    /// checked for existence.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError>;

    /// Permanent URL for an object in a publicly readable bucket.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    InvalidConfig(String),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "object not found"),
            StoreError::InvalidConfig(msg) => write!(f, "invalid object store config: {}", msg),
            StoreError::Backend(msg) => write!(f, "object store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
