use std::sync::Arc;

use nf_store::NodeStore;

use crate::cache::TreeCache;

/// Everything a factory operation needs: the durable store and the cache.
///
/// Cloning is cheap; clones share the same store and cache.
#[derive(Clone)]
pub struct FactoryContext {
    pub store: Arc<dyn NodeStore>,
    pub cache: Arc<TreeCache>,
}

impl FactoryContext {
    pub fn new(store: Arc<dyn NodeStore>, cache: Arc<TreeCache>) -> Self {
        Self { store, cache }
    }

    /// Bind `store` to a fresh cache of default capacity.
    pub fn with_store(store: Arc<dyn NodeStore>) -> Self {
        Self::new(store, Arc::new(TreeCache::default()))
    }
}

impl std::fmt::Debug for FactoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryContext")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
