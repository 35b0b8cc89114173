//! Broadcast coordination for node-factory.
//!
//! After a mutating operation succeeds, every subtree whose shape changed is
//! re-expanded and announced to all connected clients. This crate decides
//! *what* to announce; delivery is left to whatever transport the host
//! wires up (see `nf-server` for the SSE feed).
//!
//! - [`TreeEvent`] -- the events clients receive, and their wire names
//! - [`Broadcaster`] -- fan-out to filtered subscribers over
//!   `tokio::sync::broadcast`
//! - [`broadcast_node_update`] -- maps touched nodes to subtree events
//! - [`Session`] -- per-client event handling (`init`, mutations, `dump`)

pub mod broadcast;
pub mod broadcaster;
pub mod error;
pub mod event;
pub mod session;

pub use broadcast::{broadcast_node_update, broadcast_subtree_updates};
pub use broadcaster::{Broadcaster, EventStream, SubscriptionFilter, DEFAULT_CHANNEL_CAPACITY};
pub use error::{EventError, EventResult};
pub use event::{names, EventMessage, TreeEvent};
pub use session::{Environment, Outcome, Session};
