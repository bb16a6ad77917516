//! Object storage for uploaded product images.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;

/// Errors from the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    PutFailed(String),
}

/// A place to put public files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key` and return its public URL.
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3 (or S3-compatible) bucket.
///
/// Credentials come from the default AWS chain (`AWS_ACCESS_KEY_ID` /
/// `AWS_SECRET_ACCESS_KEY`, profile, or an instance role).
pub struct S3Store {
    client: Client,
    config: StorageConfig,
}

impl S3Store {
    /// Build a client for the configured bucket.
    pub async fn new(config: &StorageConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let client = match &config.endpoint {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&shared)
                    .endpoint_url(endpoint)
                    // MinIO and most S3-compatible services need path-style URLs
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&shared),
        };

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::PutFailed(format!("S3 upload failed: {e}")))?;

        debug!(key, size, bucket = %self.config.bucket, "Stored object in S3");

        Ok(self.config.public_url(key))
    }
}
