//! Test utilities for handler and application tests.

use std::sync::Arc;

use axum_test::TestServer;

use crate::config::{Config, MemoryStorageConfig, StorageConfig};
use crate::storage::{InMemoryStorage, ObjectStorage};

pub const TEST_BUCKET: &str = "test-bucket";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        storage: StorageConfig::Memory(MemoryStorageConfig {
            bucket: TEST_BUCKET.to_string(),
        }),
        ..Default::default()
    }
}

/// An empty in-memory bucket using the test config's default expiry
pub fn create_test_storage() -> InMemoryStorage {
    InMemoryStorage::new(TEST_BUCKET, create_test_config().presign.default_expiry)
}

pub fn create_test_app(storage: impl ObjectStorage + 'static) -> TestServer {
    create_test_app_with_config(create_test_config(), storage)
}

pub fn create_test_app_with_config(config: Config, storage: impl ObjectStorage + 'static) -> TestServer {
    let app = crate::Application::with_storage(config, Arc::new(storage)).expect("Failed to create application");
    app.into_test_server()
}
