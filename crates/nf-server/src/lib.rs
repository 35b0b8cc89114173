//! HTTP host for node-factory.
//!
//! Exposes the tree over a small REST surface plus a server-sent event feed
//! that carries subtree updates to subscribers.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{ServerConfig, StoreConfig};
pub use error::{ApiError, ServerError, ServerResult};
pub use server::NodeFactoryServer;
pub use state::AppState;
