use thiserror::Error;

use crate::schema::NodeField;

/// Errors produced by type conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id: {0:?}")]
    InvalidId(String),

    #[error("unknown node type: {0:?}")]
    UnknownType(String),
}

/// A node failed one of its field checks.
///
/// The `Display` output is the human-readable message from the field table,
/// verbatim, so it can be forwarded to clients as-is.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// The first field that failed, in check order.
    pub field: NodeField,
    /// Message associated with the field rule.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: NodeField) -> Self {
        Self {
            field,
            message: field.message().to_string(),
        }
    }
}
