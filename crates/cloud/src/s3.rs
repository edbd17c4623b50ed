//! S3 implementation of [`StorageProvider`].

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::storage::{key_for_url, StorageProvider};

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    /// Build a client from config. Explicit keys take precedence over the
    /// default AWS credential chain.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "filmgen-env",
            ));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(bucket = %config.bucket, region = %config.region, "S3 storage configured");

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl StorageProvider for S3Storage {
    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError> {
        let key = key_for_url(&self.public_base_url, url)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
        tracing::debug!(bucket = %self.bucket, key = %key, "Deleted object");
        Ok(())
    }
}
