//! In-process object store, used for tests and local development.

use async_trait::async_trait;
use aws_sdk_s3::primitives::{DateTime, DateTimeFormat};
use axum::body::Bytes;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

use super::store::{ObjectInfo, ObjectStore, StoreError, StoredObject};

struct MemoryObject {
    data: Bytes,
    content_type: String,
    last_modified: SystemTime,
    etag: String,
}

impl MemoryObject {
    fn info(&self, key: &str) -> ObjectInfo {
        ObjectInfo {
            name: key.to_string(),
            size: self.data.len() as u64,
            content_type: Some(self.content_type.clone()),
            last_modified: DateTime::from(self.last_modified)
                .fmt(DateTimeFormat::DateTime)
                .ok(),
            etag: Some(self.etag.clone()),
        }
    }
}

/// Object store backed by a sorted map, so listings come back in key order.
pub struct MemoryStore {
    base_url: String,
    objects: RwLock<BTreeMap<String, MemoryObject>>,
}

impl MemoryStore {
    /// `base_url` prefixes the URLs returned by `public_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        let object = MemoryObject {
            data,
            content_type: content_type.to_string(),
            last_modified: SystemTime::now(),
            etag: format!("\"{}\"", uuid::Uuid::new_v4().simple()),
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let objects = self.objects.read().await;
        let object = objects.get(key).ok_or(StoreError::NotFound)?;
        let data = object.data.clone();

        Ok(StoredObject {
            content_type: object.content_type.clone(),
            size: data.len() as u64,
            body: futures::stream::once(async move { Ok(data) }).boxed(),
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo, StoreError> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .map(|object| object.info(key))
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| object.info(key))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        Ok(format!(
            "{}?expires_in={}",
            self.public_url(key),
            expires_in.as_secs()
        ))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}
