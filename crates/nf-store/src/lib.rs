//! Persistent node storage for node-factory.
//!
//! The store is the sole durable owner of nodes. It is a flat collection
//! keyed by node id; the tree shape exists only through each node's `parent`
//! field, and the store never enforces it.
//!
//! # Storage Backends
//!
//! All backends implement the [`NodeStore`] trait:
//!
//! - [`InMemoryNodeStore`] -- `HashMap`-based store for tests and embedding
//! - [`LogNodeStore`] -- durable append-only log, replayed into memory on open
//!
//! # Design Rules
//!
//! 1. Bulk operations are keyed by id and order-independent.
//! 2. Upserting an existing id replaces the whole document.
//! 3. Deleting a missing id is not an error.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod log;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use log::{LogNodeStore, LogRecord, SyncMode};
pub use memory::InMemoryNodeStore;
pub use traits::NodeStore;
