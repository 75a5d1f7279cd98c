//! Contract for the per-origin cache storage engine the broker fronts.

use crate::error::StorageError;
use crate::origin::Origin;
use async_trait::async_trait;
use std::sync::Arc;

/// Asynchronous store of named caches, partitioned by origin.
///
/// Calls are issued from spawned tasks, so implementations must be
/// `Send + Sync` and may complete in any order.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Cache object handed out by the store. The broker only holds it; it
    /// never looks inside.
    type Cache: Send + Sync + 'static;

    /// Open an existing cache.
    async fn get(&self, origin: &Origin, name: &str) -> Result<Arc<Self::Cache>, StorageError>;

    /// Whether a cache with this name exists.
    async fn has(&self, origin: &Origin, name: &str) -> Result<bool, StorageError>;

    /// Create a new cache; fails with `Exists` if the name is taken.
    async fn create(&self, origin: &Origin, name: &str)
        -> Result<Arc<Self::Cache>, StorageError>;

    /// Delete a cache. `Ok(true)` means a cache was actually removed.
    async fn delete(&self, origin: &Origin, name: &str) -> Result<bool, StorageError>;

    /// All cache names for the origin, in store-defined order.
    async fn enumerate(&self, origin: &Origin) -> Result<Vec<String>, StorageError>;
}
