#![allow(dead_code)]

use async_trait::async_trait;
use cachewire_core::{CacheStore, MemoryCache, MemoryCacheStore, Origin, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub const KEYS_GATE: &str = "*keys*";

pub fn origin() -> Origin {
    Origin::from_scope("https://app.example/sw/").unwrap()
}

/// Wraps a memory store so the test decides when each call completes.
pub struct GatedStore {
    inner: MemoryCacheStore,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    finished: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: MemoryCacheStore) -> Self {
        Self {
            inner,
            gates: Mutex::new(HashMap::new()),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryCacheStore {
        &self.inner
    }

    /// Hold the next call for `name` until the returned sender fires.
    pub fn gate(&self, name: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(name.to_string(), rx);
        tx
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    async fn pass<T>(&self, name: &str, call: impl std::future::Future<Output = T>) -> T {
        let gate = self.gates.lock().unwrap().remove(name);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let result = call.await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl CacheStore for GatedStore {
    type Cache = MemoryCache;

    async fn get(&self, origin: &Origin, name: &str) -> Result<Arc<MemoryCache>, StorageError> {
        self.pass(name, self.inner.get(origin, name)).await
    }

    async fn has(&self, origin: &Origin, name: &str) -> Result<bool, StorageError> {
        self.pass(name, self.inner.has(origin, name)).await
    }

    async fn create(
        &self,
        origin: &Origin,
        name: &str,
    ) -> Result<Arc<MemoryCache>, StorageError> {
        self.pass(name, self.inner.create(origin, name)).await
    }

    async fn delete(&self, origin: &Origin, name: &str) -> Result<bool, StorageError> {
        self.pass(name, self.inner.delete(origin, name)).await
    }

    async fn enumerate(&self, origin: &Origin) -> Result<Vec<String>, StorageError> {
        self.pass(KEYS_GATE, self.inner.enumerate(origin)).await
    }
}

/// Store answering every call with a fixed result.
pub struct ScriptedStore {
    pub cache: Result<Arc<String>, StorageError>,
    pub has: Result<bool, StorageError>,
    pub delete: Result<bool, StorageError>,
    pub names: Result<Vec<String>, StorageError>,
    /// Make `get` panic instead of answering.
    pub panic_on_get: bool,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self {
            cache: Ok(Arc::new("scripted".to_string())),
            has: Ok(true),
            delete: Ok(true),
            names: Ok(Vec::new()),
            panic_on_get: false,
        }
    }
}

#[async_trait]
impl CacheStore for ScriptedStore {
    type Cache = String;

    async fn get(&self, _origin: &Origin, name: &str) -> Result<Arc<String>, StorageError> {
        if self.panic_on_get {
            panic!("scripted store failure opening '{}'", name);
        }
        self.cache.clone()
    }

    async fn has(&self, _origin: &Origin, _name: &str) -> Result<bool, StorageError> {
        self.has.clone()
    }

    async fn create(&self, _origin: &Origin, _name: &str) -> Result<Arc<String>, StorageError> {
        self.cache.clone()
    }

    async fn delete(&self, _origin: &Origin, _name: &str) -> Result<bool, StorageError> {
        self.delete.clone()
    }

    async fn enumerate(&self, _origin: &Origin) -> Result<Vec<String>, StorageError> {
        self.names.clone()
    }
}
