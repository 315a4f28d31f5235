//! S3-compatible object store (AWS S3, MinIO, ...).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use axum::body::Bytes;
use futures::StreamExt;
use std::io;
use std::time::Duration;
use url::Url;

use super::store::{DEFAULT_CONTENT_TYPE, ObjectInfo, ObjectStore, StoreError, StoredObject};

/// Region that must not be sent as a bucket location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// `host:port`, or a full URL with scheme
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
    pub region: String,
    pub bucket: String,
}

impl S3Settings {
    /// Resolve the endpoint to a URL, adding a scheme from `use_ssl` when
    /// none is given.
    pub fn endpoint_url(&self) -> Result<Url, StoreError> {
        let raw = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.use_ssl { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint)
        };

        let url = Url::parse(&raw)
            .map_err(|e| StoreError::InvalidConfig(format!("endpoint {:?}: {}", raw, e)))?;

        if url.host_str().is_none() {
            return Err(StoreError::InvalidConfig(format!(
                "endpoint {:?} has no host",
                raw
            )));
        }

        Ok(url)
    }
}

pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
    base_url: String,
}

fn backend<E: std::error::Error>(context: &str, e: E) -> StoreError {
    StoreError::Backend(format!("{}: {}", context, DisplayErrorContext(e)))
}

fn format_time(time: &DateTime) -> Option<String> {
    time.fmt(DateTimeFormat::DateTime).ok()
}

fn byte_stream(body: ByteStream) -> futures::stream::BoxStream<'static, Result<Bytes, io::Error>> {
    futures::stream::try_unfold(body, |mut body| async move {
        match body.try_next().await {
            Ok(Some(chunk)) => Ok(Some((chunk, body))),
            Ok(None) => Ok(None),
            Err(e) => Err(io::Error::other(e)),
        }
    })
    .boxed()
}

impl S3Store {
    /// Build a client with static credentials and path-style addressing.
    pub async fn connect(settings: &S3Settings) -> Result<Self, StoreError> {
        let endpoint = settings.endpoint_url()?;
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(endpoint.as_str())
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            base_url: endpoint.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket if it does not exist and make it publicly readable.
    /// Failing to apply the policy is logged and otherwise ignored.
    pub async fn ensure_bucket(&self) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::debug!(bucket = %self.bucket, "Bucket exists");
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                let mut request = self.client.create_bucket().bucket(&self.bucket);
                if self.region != DEFAULT_REGION {
                    request = request.create_bucket_configuration(
                        CreateBucketConfiguration::builder()
                            .location_constraint(BucketLocationConstraint::from(
                                self.region.as_str(),
                            ))
                            .build(),
                    );
                }
                request
                    .send()
                    .await
                    .map_err(|e| backend("create bucket", e))?;
                tracing::info!(bucket = %self.bucket, "Created bucket");
            }
            Err(e) => return Err(backend("head bucket", e)),
        }

        if let Err(e) = self
            .client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(public_read_policy(&self.bucket))
            .send()
            .await
        {
            tracing::warn!(
                bucket = %self.bucket,
                error = %DisplayErrorContext(e),
                "Failed to set public-read bucket policy"
            );
        }

        Ok(())
    }
}

/// Anonymous `s3:GetObject` on every key of the bucket.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }],
    })
    .to_string()
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| backend("put object", e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound
                } else {
                    backend("get object", e)
                }
            })?;

        let content_type = output
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let size = output
            .content_length()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        Ok(StoredObject {
            content_type,
            size,
            body: byte_stream(output.body),
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StoreError::NotFound
                } else {
                    backend("head object", e)
                }
            })?;

        Ok(ObjectInfo {
            name: key.to_string(),
            size: output
                .content_length()
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(0),
            content_type: output.content_type().map(str::to_string),
            last_modified: output.last_modified().and_then(format_time),
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| backend("list objects", e))?;

            for object in output.contents() {
                let Some(name) = object.key() else {
                    continue;
                };
                objects.push(ObjectInfo {
                    name: name.to_string(),
                    size: object
                        .size()
                        .and_then(|n| u64::try_from(n).ok())
                        .unwrap_or(0),
                    content_type: None,
                    last_modified: object.last_modified().and_then(format_time),
                    etag: object.e_tag().map(str::to_string),
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend("delete object", e))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| backend("presign get", e))?;

        Ok(request.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }
}
