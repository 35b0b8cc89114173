use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use nf_core::DEFAULT_CACHE_CAPACITY;
use nf_events::{Environment, DEFAULT_CHANNEL_CAPACITY};
use nf_store::SyncMode;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Environment variable overriding `bind_addr`.
pub const ENV_BIND: &str = "NODE_FACTORY_BIND";
/// Environment variable overriding `environment`.
pub const ENV_ENVIRONMENT: &str = "NODE_FACTORY_ENV";
/// Environment variable overriding `cache_max_entries`.
pub const ENV_CACHE_MAX_ITEMS: &str = "NODE_FACTORY_CACHE_MAX_ITEMS";
/// Environment variable selecting a durable log store at the given path.
pub const ENV_DATA: &str = "NODE_FACTORY_DATA";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Maximum number of cached subtree expansions.
    pub cache_max_entries: usize,
    /// Per-subscriber event buffer.
    pub channel_capacity: usize,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            environment: Environment::Production,
            cache_max_entries: DEFAULT_CACHE_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            store: StoreConfig::Memory,
        }
    }
}

/// Which store backend to open.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Volatile; everything is lost on exit.
    #[default]
    Memory,
    /// Durable append-only log.
    Log {
        path: PathBuf,
        #[serde(default)]
        sync: SyncMode,
    },
}

impl ServerConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ServerError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Apply `NODE_FACTORY_*` overrides from the given variables.
    pub fn apply_overrides<I>(&mut self, vars: I) -> ServerResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_BIND => {
                    self.bind_addr = value
                        .parse()
                        .map_err(|e| ServerError::Config(format!("{ENV_BIND}={value:?}: {e}")))?;
                }
                ENV_ENVIRONMENT => {
                    self.environment = value.parse().unwrap_or_default();
                }
                ENV_CACHE_MAX_ITEMS => {
                    self.cache_max_entries = value.parse().map_err(|e| {
                        ServerError::Config(format!("{ENV_CACHE_MAX_ITEMS}={value:?}: {e}"))
                    })?;
                }
                ENV_DATA => {
                    let sync = match &self.store {
                        StoreConfig::Log { sync, .. } => *sync,
                        StoreConfig::Memory => SyncMode::default(),
                    };
                    self.store = StoreConfig::Log {
                        path: PathBuf::from(value),
                        sync,
                    };
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.cache_max_entries == 0 {
            return Err(ServerError::Config("cache_max_entries must be > 0".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ServerError::Config("channel_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}
