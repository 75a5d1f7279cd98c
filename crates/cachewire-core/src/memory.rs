//! In-process [`CacheStore`] keeping caches in memory.
//!
//! Cache names are enumerated in creation order. The store can be put into a
//! closing state or a failing state to exercise the broker's error paths.

use crate::error::StorageError;
use crate::origin::Origin;
use crate::store::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A named cache owned by a [`MemoryCacheStore`].
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
}

impl MemoryCache {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
struct OriginCaches {
    order: Vec<String>,
    caches: HashMap<String, Arc<MemoryCache>>,
}

#[derive(Default)]
pub struct MemoryCacheStore {
    origins: Mutex<HashMap<Origin, OriginCaches>>,
    closing: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create caches synchronously, skipping names that already exist.
    pub fn preload<I, N>(&self, origin: &Origin, names: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut origins = self.lock_origins()?;
        let entry = origins.entry(origin.clone()).or_default();
        for name in names {
            let name = name.into();
            if !entry.caches.contains_key(&name) {
                Self::insert(entry, name);
            }
        }
        Ok(())
    }

    /// Refuse all further operations with `Closing`.
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    /// Make every operation fail with `Storage { message }` until cleared.
    pub fn set_failure(&self, message: Option<String>) {
        match self.failure.lock() {
            Ok(mut failure) => *failure = message,
            Err(poisoned) => *poisoned.into_inner() = message,
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(StorageError::Closing);
        }
        let failure = self
            .failure
            .lock()
            .map_err(|e| StorageError::storage(e.to_string()))?;
        match failure.as_ref() {
            Some(message) => Err(StorageError::storage(message.clone())),
            None => Ok(()),
        }
    }

    fn lock_origins(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Origin, OriginCaches>>, StorageError> {
        self.check()?;
        self.origins
            .lock()
            .map_err(|e| StorageError::storage(e.to_string()))
    }

    fn insert(entry: &mut OriginCaches, name: String) -> Arc<MemoryCache> {
        let cache = Arc::new(MemoryCache {
            name: name.clone(),
        });
        entry.order.push(name.clone());
        entry.caches.insert(name, Arc::clone(&cache));
        cache
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    type Cache = MemoryCache;

    async fn get(&self, origin: &Origin, name: &str) -> Result<Arc<MemoryCache>, StorageError> {
        let origins = self.lock_origins()?;
        origins
            .get(origin)
            .and_then(|entry| entry.caches.get(name))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn has(&self, origin: &Origin, name: &str) -> Result<bool, StorageError> {
        let origins = self.lock_origins()?;
        Ok(origins
            .get(origin)
            .is_some_and(|entry| entry.caches.contains_key(name)))
    }

    async fn create(
        &self,
        origin: &Origin,
        name: &str,
    ) -> Result<Arc<MemoryCache>, StorageError> {
        let mut origins = self.lock_origins()?;
        let entry = origins.entry(origin.clone()).or_default();
        if entry.caches.contains_key(name) {
            return Err(StorageError::Exists);
        }
        Ok(Self::insert(entry, name.to_string()))
    }

    async fn delete(&self, origin: &Origin, name: &str) -> Result<bool, StorageError> {
        let mut origins = self.lock_origins()?;
        let entry = origins.get_mut(origin).ok_or(StorageError::NotFound)?;
        if entry.caches.remove(name).is_none() {
            return Err(StorageError::NotFound);
        }
        entry.order.retain(|n| n != name);
        Ok(true)
    }

    async fn enumerate(&self, origin: &Origin) -> Result<Vec<String>, StorageError> {
        let origins = self.lock_origins()?;
        Ok(origins
            .get(origin)
            .map(|entry| entry.order.clone())
            .unwrap_or_default())
    }
}
