use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nf_core::{NodeFactory, TreeCache};
use nf_events::{Broadcaster, Environment, Session};
use nf_store::{InMemoryNodeStore, LogNodeStore, NodeStore};
use tracing::info;

use crate::config::{ServerConfig, StoreConfig};
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub factory: NodeFactory,
    pub broadcaster: Arc<Broadcaster>,
    pub environment: Environment,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(factory: NodeFactory, broadcaster: Arc<Broadcaster>, environment: Environment) -> Self {
        Self {
            factory,
            broadcaster,
            environment,
            started_at: Utc::now(),
        }
    }

    /// Open the configured store and wire up a factory and broadcaster.
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        let store = open_store(&config.store)?;
        let capacity = NonZeroUsize::new(config.cache_max_entries)
            .ok_or_else(|| ServerError::Config("cache_max_entries must be > 0".into()))?;
        let factory = NodeFactory::with_store(store, TreeCache::new(capacity));
        let broadcaster = Arc::new(Broadcaster::new(config.channel_capacity));
        Ok(Self::new(factory, broadcaster, config.environment))
    }

    /// Volatile state for tests and throwaway servers.
    pub fn in_memory(environment: Environment) -> Self {
        Self::new(
            NodeFactory::in_memory(),
            Arc::new(Broadcaster::default()),
            environment,
        )
    }

    /// A session for one request or one subscriber.
    pub fn session(&self) -> Session {
        Session::new(
            self.factory.clone(),
            self.broadcaster.clone(),
            self.environment,
        )
    }
}

/// Open the store backend named by `config`.
pub fn open_store(config: &StoreConfig) -> ServerResult<Arc<dyn NodeStore>> {
    match config {
        StoreConfig::Memory => {
            info!("using in-memory store");
            Ok(Arc::new(InMemoryNodeStore::new()))
        }
        StoreConfig::Log { path, sync } => {
            let store = LogNodeStore::open(path, *sync)?;
            info!(path = %path.display(), nodes = store.len(), "using log store");
            Ok(Arc::new(store))
        }
    }
}
