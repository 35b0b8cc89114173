use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use nf_types::{ExpandedNode, NodeId};

/// Default maximum number of cached expansions.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Bounded, recency-evicting cache of expanded nodes keyed by id.
///
/// Each entry is a node together with a materialized copy of its subtree.
/// The cache is advisory: dropping any entry at any time only costs a store
/// round-trip on the next read. Individual calls are atomic; sequences of
/// calls are not, and callers that patch several entries for one logical
/// change do so one call at a time.
pub struct TreeCache {
    inner: Mutex<LruCache<NodeId, ExpandedNode>>,
}

impl TreeCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Create a cache with [`DEFAULT_CACHE_CAPACITY`].
    pub fn with_default_capacity() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    /// Fetch a clone of the entry, promoting it to most-recently-used.
    pub fn get(&self, id: &NodeId) -> Option<ExpandedNode> {
        self.inner.lock().expect("lock poisoned").get(id).cloned()
    }

    /// Fetch a clone of the entry without touching recency.
    pub fn peek(&self, id: &NodeId) -> Option<ExpandedNode> {
        self.inner.lock().expect("lock poisoned").peek(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.inner.lock().expect("lock poisoned").contains(id)
    }

    /// Insert or replace the entry keyed by `node.id`.
    pub fn set(&self, node: ExpandedNode) {
        self.inner.lock().expect("lock poisoned").put(node.id, node);
    }

    /// Remove an entry, returning it if it was present.
    pub fn delete(&self, id: &NodeId) -> Option<ExpandedNode> {
        self.inner.lock().expect("lock poisoned").pop(id)
    }

    /// Patch an entry in place. Returns `false` (and does nothing) on a miss.
    pub fn update<F>(&self, id: &NodeId, f: F) -> bool
    where
        F: FnOnce(&mut ExpandedNode),
    {
        let mut cache = self.inner.lock().expect("lock poisoned");
        match cache.peek_mut(id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("lock poisoned").is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().expect("lock poisoned").clear();
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("lock poisoned").cap().get()
    }

    /// Ids of all cached entries, most recently used first.
    pub fn ids(&self) -> Vec<NodeId> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for TreeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
