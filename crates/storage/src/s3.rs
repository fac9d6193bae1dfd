//! S3-compatible object store (AWS S3, MinIO).

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;

use crate::{persist_scratch, scratch_file_in, RemoteObject, StorageError, StorageGateway};

/// Connection settings for an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible services such as MinIO.
    /// `None` uses the AWS endpoint for `region`.
    pub endpoint_url: Option<String>,
    pub bucket: String,
    pub region: String,
    /// Path-style addressing; required by MinIO.
    pub force_path_style: bool,
}

impl S3Config {
    pub fn aws(bucket: String, region: String) -> Self {
        Self {
            endpoint_url: None,
            bucket,
            region,
            force_path_style: false,
        }
    }
}

/// [`StorageGateway`] over the AWS SDK. Credentials come from the default
/// provider chain (env vars, profile, instance metadata).
pub struct S3Storage {
    client: Client,
    config: S3Config,
}

impl S3Storage {
    pub async fn new(config: S3Config) -> Self {
        let client = build_s3_client(&config).await;
        Self { client, config }
    }

    pub fn from_client(client: Client, config: S3Config) -> Self {
        Self { client, config }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[async_trait]
impl StorageGateway for S3Storage {
    async fn put(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            StorageError::io(local_path, std::io::Error::other(e.to_string()))
        })?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::backend(key, DisplayErrorContext(&e)))?;

        tracing::debug!(key, bucket = %self.config.bucket, "Stored object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let page = request
                .send()
                .await
                .map_err(|e| StorageError::backend(prefix, DisplayErrorContext(&e)))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    objects.push(RemoteObject {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }

            if page.is_truncated() == Some(true) {
                continuation_token = page.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                return Err(StorageError::backend(key, DisplayErrorContext(&service_error)));
            }
        };

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;

        let part = scratch_file_in(parent)?;
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| StorageError::io(part.to_path_buf(), e))?;
        let mut body = response.body;
        while let Some(bytes) = body
            .try_next()
            .await
            .map_err(|e| StorageError::backend(key, e))?
        {
            file.write_all(&bytes)
                .await
                .map_err(|e| StorageError::io(part.to_path_buf(), e))?;
        }
        file.flush().await.map_err(|e| StorageError::io(part.to_path_buf(), e))?;
        drop(file);

        persist_scratch(part, dest)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

async fn build_s3_client(config: &S3Config) -> Client {
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(config.region.clone()))
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }
    if config.force_path_style {
        builder = builder.force_path_style(true);
    }

    Client::from_conf(builder.build())
}
