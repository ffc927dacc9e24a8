//! Object storage abstraction layer
//!
//! The gateway never talks to a storage service directly. Everything goes through the
//! [`ObjectStorage`] trait, which exposes the three capabilities the router needs:
//! listing keys under a prefix, deleting a key, and minting a presigned PUT URL.
//!
//! Two backends are provided:
//!
//! - [`s3::S3Storage`]: AWS S3 or any S3-compatible service, via `aws-sdk-s3`
//! - [`in_memory::InMemoryStorage`]: a process-local bucket for development and tests

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aws_sdk_s3::types::ObjectCannedAcl;
use serde::{Deserialize, Serialize};

use crate::config::{PresignConfig, StorageConfig};

pub mod in_memory;
pub mod s3;

pub use in_memory::InMemoryStorage;
pub use s3::S3Storage;

/// Create a storage backend from configuration
///
/// This is the single point where we convert config into backend instances.
pub async fn create_storage(config: &StorageConfig, presign: &PresignConfig) -> Arc<dyn ObjectStorage> {
    match config {
        StorageConfig::S3(s3_config) => Arc::new(S3Storage::from_config(s3_config, presign.default_expiry).await),
        StorageConfig::Memory(memory_config) => Arc::new(InMemoryStorage::new(&memory_config.bucket, presign.default_expiry)),
    }
}

/// Result type for storage backend operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors returned by a storage backend.
///
/// The messages carry the backend's own error detail. They are meant for logs, the HTTP
/// layer never hands them to callers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to list objects under '{prefix}': {message}")]
    List { prefix: String, message: String },

    #[error("failed to delete object '{key}': {message}")]
    Delete { key: String, message: String },

    #[error("failed to presign upload for '{key}': {message}")]
    Presign { key: String, message: String },
}

/// Canned ACL applied to an object written through a presigned URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl ObjectAcl {
    /// Wire value of the ACL, as sent in the `x-amz-acl` header
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
            ObjectAcl::PublicReadWrite => "public-read-write",
            ObjectAcl::AuthenticatedRead => "authenticated-read",
            ObjectAcl::BucketOwnerRead => "bucket-owner-read",
            ObjectAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl From<ObjectAcl> for ObjectCannedAcl {
    fn from(acl: ObjectAcl) -> Self {
        match acl {
            ObjectAcl::Private => ObjectCannedAcl::Private,
            ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
            ObjectAcl::PublicReadWrite => ObjectCannedAcl::PublicReadWrite,
            ObjectAcl::AuthenticatedRead => ObjectCannedAcl::AuthenticatedRead,
            ObjectAcl::BucketOwnerRead => ObjectCannedAcl::BucketOwnerRead,
            ObjectAcl::BucketOwnerFullControl => ObjectCannedAcl::BucketOwnerFullControl,
        }
    }
}

/// Per-request overrides for presigning. `None` leaves the backend default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresignOptions {
    pub acl: Option<ObjectAcl>,
    pub expires_in: Option<Duration>,
}

/// One entry of a listing.
///
/// S3 models the key of a listed object as optional, so the trait does too; callers decide
/// what to do with entries that have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: Option<String>,
    pub size: Option<i64>,
}

/// Abstract object storage interface
///
/// Implementors operate on a single bucket fixed at construction time.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Name of the bucket this backend operates on
    fn bucket(&self) -> &str;

    /// List every object whose key starts with `prefix`.
    ///
    /// Implementations must follow pagination to the end; the result is the complete listing.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ListedObject>>;

    /// Delete the object stored at `key`.
    ///
    /// Deleting a key that does not exist is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Mint a presigned URL allowing the bearer to PUT an object at `key`.
    async fn presign_put(&self, key: &str, options: PresignOptions) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStorageConfig;

    #[tokio::test]
    async fn test_create_storage_uses_configured_bucket() {
        let config = StorageConfig::Memory(MemoryStorageConfig {
            bucket: "dev-uploads".to_string(),
        });

        let storage = create_storage(&config, &PresignConfig::default()).await;

        assert_eq!(storage.bucket(), "dev-uploads");
        let url = storage.presign_put("standards/a.pdf", PresignOptions::default()).await.unwrap();
        assert_eq!(url, "memory://dev-uploads/standards/a.pdf?X-Amz-Expires=900");
    }
}
