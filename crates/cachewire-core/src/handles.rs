//! Bijective registry between cache objects and the integer handles the
//! remote side uses to name them.
//!
//! The table is the broker side's only long-lived owner of a cache: each live
//! mapping holds exactly one `Arc`. Handles cross the boundary as plain
//! integers, so a misbehaving client can at worst name a handle that does not
//! exist.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Handle naming a cache object for the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheId(u64);

impl CacheId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for CacheId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the allocation behind an `Arc`. Stable while the table holds
/// its own reference, so it cannot be recycled for another object.
fn identity<T>(cache: &Arc<T>) -> usize {
    Arc::as_ptr(cache) as usize
}

/// Cache object ⇄ [`CacheId`] registry.
///
/// Ids are allocated monotonically from zero and never reused within one
/// table. Registration compares objects by identity, never by value: two
/// distinct caches with the same name get two handles.
pub struct HandleTable<T> {
    by_identity: HashMap<usize, CacheId>,
    by_id: BTreeMap<CacheId, Arc<T>>,
    next_id: u64,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            by_identity: HashMap::new(),
            by_id: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Return the handle for `cache`, allocating one on first sight.
    ///
    /// A new mapping retains one reference to the cache; a repeated
    /// registration takes none.
    pub fn register_or_lookup(&mut self, cache: &Arc<T>) -> CacheId {
        let key = identity(cache);
        if let Some(&id) = self.by_identity.get(&key) {
            return id;
        }

        let id = CacheId(self.next_id);
        self.next_id += 1;
        self.by_identity.insert(key, id);
        self.by_id.insert(id, Arc::clone(cache));
        id
    }

    /// Drop the mapping for `id` and its reference. Unknown ids are ignored so
    /// duplicate or late disposals are harmless.
    ///
    /// Returns whether a mapping was removed.
    pub fn release(&mut self, id: CacheId) -> bool {
        match self.by_id.remove(&id) {
            Some(cache) => {
                let removed = self.by_identity.remove(&identity(&cache));
                debug_assert_eq!(removed, Some(id));
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, id: CacheId) -> Option<Arc<T>> {
        self.by_id.get(&id).cloned()
    }

    pub fn contains(&self, id: CacheId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Live mappings in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (CacheId, &Arc<T>)> {
        self.by_id.iter().map(|(id, cache)| (*id, cache))
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.by_id.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
