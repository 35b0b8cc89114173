use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::id::NodeId;

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// Static description of a node type: whether it can hold children, and
/// which payloads it accepts.
#[derive(Debug)]
pub struct TypeSpec {
    pub name: &'static str,
    /// Leaf types never have children; traversals stop at them.
    pub is_leaf: bool,
    pub validate: fn(&Value) -> bool,
}

static ROOT_SPEC: TypeSpec = TypeSpec {
    name: "root",
    is_leaf: false,
    validate: Value::is_string,
};

static FACTORY_SPEC: TypeSpec = TypeSpec {
    name: "factory",
    is_leaf: false,
    validate: Value::is_string,
};

static NUMBER_SPEC: TypeSpec = TypeSpec {
    name: "number",
    is_leaf: true,
    validate: Value::is_number,
};

/// The closed set of node types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Type of the synthesized root; may also tag ordinary containers.
    Root,
    /// Container node carrying a string label.
    Factory,
    /// Leaf node carrying a numeric value.
    Number,
}

impl NodeType {
    /// Every node type, in the order used by validation messages.
    pub const ALL: [NodeType; 3] = [NodeType::Root, NodeType::Factory, NodeType::Number];

    pub fn spec(&self) -> &'static TypeSpec {
        match self {
            Self::Root => &ROOT_SPEC,
            Self::Factory => &FACTORY_SPEC,
            Self::Number => &NUMBER_SPEC,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn is_leaf(&self) -> bool {
        self.spec().is_leaf
    }

    /// Returns `true` if `value` is an acceptable payload for this type.
    pub fn accepts(&self, value: &Value) -> bool {
        (self.spec().validate)(value)
    }

    pub fn from_name(name: &str) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A persisted node: exactly the fields the store keeps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Parent id, or [`NodeId::ROOT`] for top-level nodes.
    pub parent: NodeId,
    pub value: Value,
}

impl Node {
    pub fn new(id: NodeId, node_type: NodeType, parent: NodeId, value: impl Into<Value>) -> Self {
        Self {
            id,
            node_type,
            parent,
            value: value.into(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type.is_leaf()
    }

    /// Expand this node with the given children.
    pub fn expand(self, children: Vec<ExpandedNode>) -> ExpandedNode {
        ExpandedNode {
            id: self.id,
            node_type: self.node_type,
            parent: Some(self.parent),
            value: self.value,
            children,
        }
    }
}

// ---------------------------------------------------------------------------
// ExpandedNode
// ---------------------------------------------------------------------------

/// A node together with its materialized subtree.
///
/// Used for cache entries and for delivery to clients. The synthesized root
/// is the only expanded node without a parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpandedNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub parent: Option<NodeId>,
    pub value: Value,
    #[serde(default)]
    pub children: Vec<ExpandedNode>,
}

impl ExpandedNode {
    /// Label carried by the synthesized root.
    pub const ROOT_VALUE: &'static str = "root";

    /// Synthesize the root with the given top-level children.
    pub fn root(children: Vec<ExpandedNode>) -> Self {
        Self {
            id: NodeId::ROOT,
            node_type: NodeType::Root,
            parent: None,
            value: Value::String(Self::ROOT_VALUE.into()),
            children,
        }
    }

    /// The persisted fields of this node, or `None` for the root.
    pub fn to_node(&self) -> Option<Node> {
        Some(Node {
            id: self.id,
            node_type: self.node_type,
            parent: self.parent?,
            value: self.value.clone(),
        })
    }

    /// Returns `true` if the persisted fields equal `node`'s.
    pub fn has_fields_of(&self, node: &Node) -> bool {
        self.id == node.id
            && self.node_type == node.node_type
            && self.parent == Some(node.parent)
            && self.value == node.value
    }

    /// Replace the persisted fields, keeping the children.
    pub fn assign_fields(&mut self, node: &Node) {
        self.id = node.id;
        self.node_type = node.node_type;
        self.parent = Some(node.parent);
        self.value = node.value.clone();
    }

    /// Flatten the subtree into persisted nodes, this node first, then all
    /// descendants depth-first.
    pub fn flatten(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<Node>) {
        if let Some(node) = self.to_node() {
            out.push(node);
        }
        for child in &self.children {
            child.flatten_into(out);
        }
    }

    pub fn child(&self, id: &NodeId) -> Option<&ExpandedNode> {
        self.children.iter().find(|c| &c.id == id)
    }

    /// Insert `child` into the children list, replacing an entry with the
    /// same id or appending.
    pub fn upsert_child(&mut self, child: ExpandedNode) {
        match self.children.iter_mut().find(|c| c.id == child.id) {
            Some(slot) => *slot = child,
            None => self.children.push(child),
        }
    }

    /// Remove the child with the given id. Returns `true` if it was present.
    pub fn remove_child(&mut self, id: &NodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| &c.id != id);
        self.children.len() != before
    }
}

impl From<Node> for ExpandedNode {
    fn from(node: Node) -> Self {
        node.expand(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// NodeCandidate
// ---------------------------------------------------------------------------

/// Untrusted, possibly partial node fields as submitted by a client.
///
/// Every field is kept as raw JSON so the validator can report exactly which
/// one is malformed. Unrecognized fields are dropped on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl NodeCandidate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(Value::String(id.to_string()));
        self
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(Value::String(node_type.name().into()));
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(Value::String(parent.to_string()));
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// The candidate's id, if it is present and well-formed.
    pub fn parsed_id(&self) -> Option<NodeId> {
        self.id
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| NodeId::parse(s).ok())
    }

    /// Overlay this candidate's fields onto `existing`: fields present here
    /// win, absent ones keep the stored value.
    pub fn merged_over(&self, existing: &Node) -> NodeCandidate {
        let base = NodeCandidate::from(existing);
        NodeCandidate {
            id: self.id.clone().or(base.id),
            node_type: self.node_type.clone().or(base.node_type),
            parent: self.parent.clone().or(base.parent),
            value: self.value.clone().or(base.value),
        }
    }
}

impl From<&Node> for NodeCandidate {
    fn from(node: &Node) -> Self {
        NodeCandidate::new()
            .with_id(node.id)
            .with_type(node.node_type)
            .with_parent(node.parent)
            .with_value(node.value.clone())
    }
}
