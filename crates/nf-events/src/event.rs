use nf_types::{ExpandedNode, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire names of client-facing events.
pub mod names {
    /// Client asks for, and receives, the full tree.
    pub const INIT: &str = "init";
    /// An operation requested by this client failed.
    pub const ERROR: &str = "err";
    /// Debug dump of every stored node (non-production only).
    pub const DUMP: &str = "dump";
    /// Prefix of subtree events; the full name is `nodeWasUpdated:<id>`.
    pub const NODE_WAS_UPDATED: &str = "nodeWasUpdated";

    pub const UPSERT_NODES: &str = "upsertNodes";
    pub const DELETE_NODES: &str = "deleteNodes";
    pub const COMPOSITE_ACTION: &str = "compositeAction";

    /// Event name announcing a new expansion of the subtree at `id`.
    pub fn node_was_updated(id: &super::NodeId) -> String {
        format!("{NODE_WAS_UPDATED}:{id}")
    }
}

/// An event delivered to clients.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeEvent {
    /// The subtree rooted at `id` changed; `node` is its fresh expansion.
    SubtreeUpdated { id: NodeId, node: ExpandedNode },
    /// Reply to `init`: the expanded root.
    Initialized(ExpandedNode),
    /// Reply to a failed event, sent only to the client that raised it.
    Error { event: String, error: String },
}

impl TreeEvent {
    pub fn event_name(&self) -> String {
        match self {
            Self::SubtreeUpdated { id, .. } => names::node_was_updated(id),
            Self::Initialized(_) => names::INIT.to_string(),
            Self::Error { .. } => names::ERROR.to_string(),
        }
    }

    /// The JSON body carried by the event.
    pub fn data(&self) -> Value {
        match self {
            Self::SubtreeUpdated { node, .. } | Self::Initialized(node) => {
                serde_json::to_value(node).unwrap_or(Value::Null)
            }
            Self::Error { event, error } => json!({ "event": event, "error": error }),
        }
    }

    pub fn to_message(&self) -> EventMessage {
        EventMessage {
            event: self.event_name(),
            data: self.data(),
        }
    }
}

/// Transport-neutral `{event, data}` envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nf_types::{Node, NodeType};

    #[test]
    fn subtree_event_name_carries_id() {
        let node = Node::new(NodeId::generate(), NodeType::Factory, NodeId::ROOT, "f");
        let event = TreeEvent::SubtreeUpdated {
            id: node.id,
            node: node.clone().into(),
        };
        assert_eq!(event.event_name(), format!("nodeWasUpdated:{}", node.id));
        assert_eq!(event.data()["value"], "f");
    }

    #[test]
    fn root_subtree_name() {
        assert_eq!(
            names::node_was_updated(&NodeId::ROOT),
            "nodeWasUpdated:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn error_message_shape() {
        let event = TreeEvent::Error {
            event: "upsertNodes".into(),
            error: "Node \"value\" property is invalid.".into(),
        };
        assert_eq!(
            event.to_message(),
            EventMessage {
                event: "err".into(),
                data: json!({
                    "event": "upsertNodes",
                    "error": "Node \"value\" property is invalid.",
                }),
            }
        );
    }

    #[test]
    fn init_carries_root() {
        let event = TreeEvent::Initialized(ExpandedNode::root(vec![]));
        let msg = event.to_message();
        assert_eq!(msg.event, "init");
        assert_eq!(msg.data["parent"], Value::Null);
        assert_eq!(msg.data["children"], json!([]));
    }
}
