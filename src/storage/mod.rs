//! Durable key/value storage for the persisted session copy
//!
//! Two drivers are available:
//! - In-memory storage - for tests and throwaway processes
//! - File storage (default) - a small JSON document on disk
//!
//! The driver is selected based on configuration.

pub mod file;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageDriver};

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key holding the serialized session identity
pub const USER_KEY: &str = "user";
/// Key holding the session expiry timestamp
pub const EXPIRATION_KEY: &str = "expiration";
/// Key holding the credential cookie snapshot
pub const CREDENTIALS_KEY: &str = "credentials";

/// Key/value storage trait
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is a no-op
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Create a storage instance based on configuration
pub fn create_storage(config: &StorageConfig) -> Arc<dyn KeyValueStore> {
    match config.driver {
        StorageDriver::Memory => Arc::new(MemoryStorage::new()),
        StorageDriver::File => Arc::new(FileStorage::new(config.path.clone())),
    }
}
