//! Node factory core.
//!
//! Orchestrates validation, parent-existence checks, change detection, store
//! writes and cache synchronization for every tree operation. All operations
//! take an explicit [`FactoryContext`] bundling the persistent store and the
//! tree cache; there is no process-wide state.
//!
//! - [`operations`] -- the individual operations as free functions
//! - [`NodeFactory`] -- a clonable handle binding a context, plus JSON
//!   dispatch by event name
//! - [`TreeCache`] -- bounded LRU of expanded subtrees

pub mod cache;
pub mod context;
pub mod error;
pub mod factory;
pub mod operations;

pub use cache::{TreeCache, DEFAULT_CACHE_CAPACITY};
pub use context::FactoryContext;
pub use error::{NodeError, NodeResult};
pub use factory::{CompositeAction, NodeFactory, Operation};
pub use operations::WriteReport;
