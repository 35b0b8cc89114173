use nf_store::StoreError;
use nf_types::{NodeId, ValidationError};

use crate::factory::Operation;

/// Errors raised by factory operations.
///
/// Everything except [`NodeError::Store`] is a caller error: the operation
/// was rejected before any store write.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A node field failed its check.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An upsert batch element was not a JSON object.
    #[error("Upsert expected an object for a node.")]
    NotAnObject,

    /// The node's parent is neither the root nor an existing node.
    #[error("Cannot upsert node, since its parent node doesn't exist.")]
    ParentMissing { id: NodeId, parent: NodeId },

    /// The new parent is the node itself or one of its descendants.
    #[error("Cannot move node {id} under {parent}, since it would become its own ancestor.")]
    ParentCycle { id: NodeId, parent: NodeId },

    /// A batch operation was given something other than an array.
    #[error("{}", .operation.expected_array_message())]
    ExpectedArray { operation: Operation },

    /// No operation is registered under this event name.
    #[error("Unknown event \"{0}\".")]
    UnknownEvent(String),

    /// The arguments could not be interpreted for this event.
    #[error("Invalid arguments for \"{event}\": {reason}")]
    InvalidArguments { event: String, reason: String },

    /// Store I/O failure, passed through unmodified.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl NodeError {
    /// Returns `true` if the caller can fix the request and retry.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Result alias for factory operations.
pub type NodeResult<T> = Result<T, NodeError>;
