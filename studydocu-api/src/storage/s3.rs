use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{ObjectStore, StorageError};
use crate::config::StorageConfig;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    presign_ttl: Duration,
}

impl S3ObjectStore {
    pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            presign_ttl: Duration::from_secs(config.presigned_url_expiration_secs),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(key, "Object uploaded");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn download_url(&self, key: &str, file_name: &str) -> Result<String, StorageError> {
        let presign_err = |message: String| StorageError::Presign {
            key: key.to_string(),
            message,
        };

        let presigning = PresigningConfig::expires_in(self.presign_ttl)
            .map_err(|e| presign_err(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(format!(
                "attachment; filename=\"{}\"",
                file_name.replace('"', "")
            ))
            .presigned(presigning)
            .await
            .map_err(|e| presign_err(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}
