//! S3 storage backend
//!
//! Works against AWS S3 and S3-compatible services (MinIO, R2, ...) through `aws-sdk-s3`.
//! Credentials come either from the static pair in the configuration or, when none is
//! configured, from the default AWS credential chain.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, config::Region, error::DisplayErrorContext, presigning::PresigningConfig, types::ObjectCannedAcl};
use tracing::{debug, instrument};

use crate::config::S3StorageConfig;

use super::{ListedObject, ObjectStorage, PresignOptions, Result, StorageError};

/// Provider name attached to credentials taken from the gateway configuration
const STATIC_CREDENTIALS_PROVIDER: &str = "bucket-gateway-config";

pub struct S3Storage {
    client: Client,
    bucket: String,
    default_expiry: Duration,
}

impl S3Storage {
    /// Wrap an existing client
    pub fn new(client: Client, bucket: impl Into<String>, default_expiry: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            default_expiry,
        }
    }

    /// Build a client from configuration
    pub async fn from_config(config: &S3StorageConfig, default_expiry: Duration) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let (Some(access_key_id), Some(secret_access_key)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                STATIC_CREDENTIALS_PROVIDER,
            ));
        }

        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint.as_str());
        }

        debug!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint_url.as_ref().map(|u| u.as_str()),
            force_path_style = config.force_path_style,
            "S3 storage backend configured"
        );

        Self::new(Client::from_conf(builder.build()), &config.bucket, default_expiry)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::List {
                prefix: prefix.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

            objects.extend(page.contents().iter().map(|object| ListedObject {
                key: object.key().map(str::to_string),
                size: object.size(),
            }));
        }

        debug!(count = objects.len(), "Listed objects");
        Ok(objects)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn presign_put(&self, key: &str, options: PresignOptions) -> Result<String> {
        let presigning = PresigningConfig::expires_in(options.expires_in.unwrap_or(self.default_expiry)).map_err(|e| {
            StorageError::Presign {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            }
        })?;

        // The ACL is part of the signature: the uploader has to send the same x-amz-acl header
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_acl(options.acl.map(ObjectCannedAcl::from))
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectAcl;

    fn test_storage() -> S3Storage {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG", None, None, "test"))
            .endpoint_url("http://localhost:9000")
            .force_path_style(true)
            .build();

        S3Storage::new(Client::from_conf(config), "uploads", Duration::from_secs(900))
    }

    #[tokio::test]
    async fn test_presign_put_targets_bucket_and_key() {
        let storage = test_storage();

        let url = storage
            .presign_put(
                "XYZ/logo/photo.jpg",
                PresignOptions {
                    acl: Some(ObjectAcl::PublicRead),
                    expires_in: Some(Duration::from_secs(300)),
                },
            )
            .await
            .expect("presigning needs no network access");

        assert!(url.starts_with("http://localhost:9000/uploads/XYZ/logo/photo.jpg?"), "unexpected url: {url}");
        assert!(url.contains("X-Amz-Expires=300"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presign_put_falls_back_to_default_expiry() {
        let storage = test_storage();

        let url = storage
            .presign_put("standards/foo.png", PresignOptions::default())
            .await
            .expect("presigning needs no network access");

        assert!(url.contains("/uploads/standards/foo.png?"));
        assert!(url.contains("X-Amz-Expires=900"));
    }

    #[tokio::test]
    async fn test_presign_put_rejects_expiry_beyond_a_week() {
        let storage = test_storage();

        let result = storage
            .presign_put(
                "standards/foo.png",
                PresignOptions {
                    acl: None,
                    expires_in: Some(Duration::from_secs(8 * 24 * 60 * 60)),
                },
            )
            .await;

        assert!(matches!(result, Err(StorageError::Presign { .. })));
    }
}
