use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::NodeId;
use crate::node::{Node, NodeCandidate, NodeType};

/// The recognized node fields, in validation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeField {
    Id,
    Type,
    Parent,
    Value,
}

impl NodeField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Type => "type",
            Self::Parent => "parent",
            Self::Value => "value",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            Self::Id => "Node \"id\" property must be a valid v4 UUID.",
            Self::Type => "Node \"type\" property must be one of [root, factory, number].",
            Self::Parent => "Node \"parent\" property must be a valid v4 UUID.",
            Self::Value => "Node \"value\" property is invalid.",
        }
    }
}

impl fmt::Display for NodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the field-check table.
#[derive(Clone, Copy, Debug)]
pub struct FieldRule {
    pub field: NodeField,
    pub message: &'static str,
}

/// Field checks applied to every node, in order.
pub const NODE_SCHEMA: [FieldRule; 4] = [
    FieldRule {
        field: NodeField::Id,
        message: NodeField::Id.message(),
    },
    FieldRule {
        field: NodeField::Type,
        message: NodeField::Type.message(),
    },
    FieldRule {
        field: NodeField::Parent,
        message: NodeField::Parent.message(),
    },
    FieldRule {
        field: NodeField::Value,
        message: NodeField::Value.message(),
    },
];

fn parse_id_field(raw: Option<&Value>) -> Option<NodeId> {
    raw.and_then(Value::as_str)
        .and_then(|s| NodeId::parse(s).ok())
}

/// Validate a candidate and return the normalized node.
///
/// Only `id`, `type`, `parent` and `value` survive. The root sentinel is a
/// valid `parent` but never a valid `id`.
pub fn validate_and_format_node(candidate: &NodeCandidate) -> Result<Node, ValidationError> {
    let id = parse_id_field(candidate.id.as_ref())
        .filter(|id| !id.is_root())
        .ok_or_else(|| ValidationError::new(NodeField::Id))?;

    let node_type = candidate
        .node_type
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|name| NodeType::from_name(name).ok())
        .ok_or_else(|| ValidationError::new(NodeField::Type))?;

    let parent = parse_id_field(candidate.parent.as_ref())
        .ok_or_else(|| ValidationError::new(NodeField::Parent))?;

    let value = candidate
        .value
        .as_ref()
        .filter(|v| node_type.accepts(v))
        .cloned()
        .ok_or_else(|| ValidationError::new(NodeField::Value))?;

    Ok(Node {
        id,
        node_type,
        parent,
        value,
    })
}
