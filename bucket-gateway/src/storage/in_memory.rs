//! In-memory storage backend.
//!
//! Objects live in a concurrent map and are lost on restart. Useful for local development
//! (`storage.type: memory`) and for exercising the router in tests: the most recent calls made
//! against the backend are recorded, and individual operations can be told to fail.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use super::{ListedObject, ObjectStorage, PresignOptions, Result, StorageError};

/// Calls kept in the log; older ones are dropped first.
pub const MAX_RECORDED_CALLS: usize = 256;

/// Operations of the storage capability, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    List,
    Delete,
    Presign,
}

/// A call received by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    List { prefix: String },
    Delete { key: String },
    PresignPut { key: String, options: PresignOptions },
}

/// In-memory implementation of the ObjectStorage trait.
///
/// Cloning is cheap and clones share the same bucket, so a test can keep a handle while the
/// router owns another.
///
/// # Example
/// ```ignore
/// let storage = InMemoryStorage::new("uploads", Duration::from_secs(900));
/// storage.put_object("ABC123/gallery/a.png", "png-bytes");
///
/// let listed = storage.list_objects("ABC123/gallery/").await?;
/// assert_eq!(listed.len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryStorage {
    bucket: String,
    default_expiry: Duration,
    objects: Arc<DashMap<String, Bytes>>,
    calls: Arc<Mutex<VecDeque<StorageCall>>>,
    failing: Arc<DashSet<StorageOperation>>,
}

impl InMemoryStorage {
    pub fn new(bucket: impl Into<String>, default_expiry: Duration) -> Self {
        Self {
            bucket: bucket.into(),
            default_expiry,
            objects: Arc::new(DashMap::new()),
            calls: Arc::new(Mutex::new(VecDeque::new())),
            failing: Arc::new(DashSet::new()),
        }
    }

    /// Store an object directly, bypassing presigned uploads
    pub fn put_object(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.insert(key.into(), data.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Make every subsequent call of `operation` fail
    pub fn fail(&self, operation: StorageOperation) {
        self.failing.insert(operation);
    }

    /// Snapshot of the last [`MAX_RECORDED_CALLS`] calls, oldest first
    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().iter().cloned().collect()
    }

    fn record(&self, call: StorageCall) {
        let mut calls = self.calls.lock();
        if calls.len() == MAX_RECORDED_CALLS {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    fn is_failing(&self, operation: StorageOperation) -> bool {
        self.failing.contains(&operation)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        self.record(StorageCall::List { prefix: prefix.to_string() });

        if self.is_failing(StorageOperation::List) {
            return Err(StorageError::List {
                prefix: prefix.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let mut objects: Vec<ListedObject> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| ListedObject {
                key: Some(entry.key().clone()),
                size: Some(entry.value().len() as i64),
            })
            .collect();

        // S3 lists keys in ascending UTF-8 order
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.record(StorageCall::Delete { key: key.to_string() });

        if self.is_failing(StorageOperation::Delete) {
            return Err(StorageError::Delete {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }

        self.objects.remove(key);
        Ok(())
    }

    async fn presign_put(&self, key: &str, options: PresignOptions) -> Result<String> {
        self.record(StorageCall::PresignPut {
            key: key.to_string(),
            options,
        });

        if self.is_failing(StorageOperation::Presign) {
            return Err(StorageError::Presign {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let expires_in = options.expires_in.unwrap_or(self.default_expiry);
        let mut url = format!("memory://{}/{}?X-Amz-Expires={}", self.bucket, key, expires_in.as_secs());
        if let Some(acl) = options.acl {
            url.push_str("&x-amz-acl=");
            url.push_str(acl.as_str());
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectAcl;

    fn storage() -> InMemoryStorage {
        InMemoryStorage::new("uploads", Duration::from_secs(900))
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_in_key_order() {
        let storage = storage();
        storage.put_object("ABC/gallery/b.png", "b");
        storage.put_object("ABC/gallery/a.png", "aa");
        storage.put_object("ABC/logo/x.png", "x");
        storage.put_object("XYZ/gallery/c.png", "c");

        let listed = storage.list_objects("ABC/gallery/").await.unwrap();

        assert_eq!(
            listed,
            vec![
                ListedObject {
                    key: Some("ABC/gallery/a.png".to_string()),
                    size: Some(2),
                },
                ListedObject {
                    key: Some("ABC/gallery/b.png".to_string()),
                    size: Some(1),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let storage = storage();
        storage.put_object("a/b", "data");

        storage.delete_object("a/b").await.unwrap();
        storage.delete_object("a/b").await.unwrap();

        assert!(!storage.contains("a/b"));
        assert_eq!(storage.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_presign_uses_default_expiry_without_override() {
        let storage = storage();

        let url = storage.presign_put("standards/foo.png", PresignOptions::default()).await.unwrap();
        assert_eq!(url, "memory://uploads/standards/foo.png?X-Amz-Expires=900");

        let url = storage
            .presign_put(
                "XYZ/logo/photo.jpg",
                PresignOptions {
                    acl: Some(ObjectAcl::PublicRead),
                    expires_in: Some(Duration::from_secs(300)),
                },
            )
            .await
            .unwrap();
        assert_eq!(url, "memory://uploads/XYZ/logo/photo.jpg?X-Amz-Expires=300&x-amz-acl=public-read");
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded_and_returned() {
        let storage = storage();
        storage.fail(StorageOperation::Delete);

        let result = storage.delete_object("a/b").await;

        assert!(matches!(result, Err(StorageError::Delete { .. })));
        assert_eq!(storage.calls(), vec![StorageCall::Delete { key: "a/b".to_string() }]);
    }

    #[tokio::test]
    async fn test_call_log_keeps_only_recent_calls() {
        let storage = storage();
        let total = MAX_RECORDED_CALLS + 44;

        for i in 0..total {
            storage.delete_object(&format!("key-{i}")).await.unwrap();
        }

        let calls = storage.calls();
        assert_eq!(calls.len(), MAX_RECORDED_CALLS);
        assert_eq!(calls[0], StorageCall::Delete { key: "key-44".to_string() });
        assert_eq!(
            calls[MAX_RECORDED_CALLS - 1],
            StorageCall::Delete {
                key: format!("key-{}", total - 1)
            }
        );
    }
}
