use std::fmt;
use std::sync::Arc;

use nf_store::{InMemoryNodeStore, NodeStore};
use nf_types::{ExpandedNode, Node, NodeCandidate, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::TreeCache;
use crate::context::FactoryContext;
use crate::error::NodeResult;
use crate::operations::{self, WriteReport};

/// The mutating operations reachable by event name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    UpsertNodes,
    DeleteNodes,
    CompositeAction,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::UpsertNodes,
        Operation::DeleteNodes,
        Operation::CompositeAction,
    ];

    /// Event name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpsertNodes => "upsertNodes",
            Self::DeleteNodes => "deleteNodes",
            Self::CompositeAction => "compositeAction",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub(crate) fn expected_array_message(&self) -> &'static str {
        match self {
            Self::UpsertNodes => "`upsertNodes` expected an array of nodes to upsert.",
            Self::DeleteNodes => "`deleteNodes` requires an array of nodes to delete.",
            Self::CompositeAction => "`compositeAction` expected an array of actions.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a composite action: an event name and its argument list.
///
/// Only the first argument is used; it is the payload passed to the named
/// operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeAction {
    pub event: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CompositeAction {
    pub fn new(operation: Operation, payload: Value) -> Self {
        Self {
            event: operation.name().to_string(),
            args: vec![payload],
        }
    }
}

/// A clonable handle binding a [`FactoryContext`] to the factory operations.
#[derive(Clone, Debug)]
pub struct NodeFactory {
    ctx: FactoryContext,
}

impl NodeFactory {
    pub fn new(ctx: FactoryContext) -> Self {
        Self { ctx }
    }

    /// Factory over `store` with a cache of the given capacity.
    pub fn with_store(store: Arc<dyn NodeStore>, cache: TreeCache) -> Self {
        Self::new(FactoryContext::new(store, Arc::new(cache)))
    }

    /// Factory over a fresh in-memory store and a default cache.
    pub fn in_memory() -> Self {
        Self::new(FactoryContext::with_store(Arc::new(InMemoryNodeStore::new())))
    }

    pub fn context(&self) -> &FactoryContext {
        &self.ctx
    }

    pub fn cache(&self) -> &TreeCache {
        &self.ctx.cache
    }

    pub async fn prepare_for_upsertion(&self, candidate: &NodeCandidate) -> NodeResult<Option<Node>> {
        operations::prepare_for_upsertion(&self.ctx, candidate).await
    }

    pub async fn upsert_nodes(&self, candidates: &[NodeCandidate]) -> NodeResult<Vec<Node>> {
        operations::upsert_nodes(&self.ctx, candidates).await
    }

    pub async fn delete_nodes(&self, candidates: &[NodeCandidate]) -> NodeResult<Vec<Node>> {
        operations::delete_nodes(&self.ctx, candidates).await
    }

    pub async fn get_node_and_transitive_children(&self, id: &NodeId) -> NodeResult<Vec<Node>> {
        operations::get_node_and_transitive_children(&self.ctx, id).await
    }

    pub async fn get_expanded_node_with_id(&self, id: &NodeId) -> NodeResult<Option<ExpandedNode>> {
        operations::get_expanded_node_with_id(&self.ctx, id).await
    }

    /// Like [`get_expanded_node_with_id`](Self::get_expanded_node_with_id),
    /// but takes an untrusted string. Malformed ids resolve to `None`.
    pub async fn get_expanded_node_with_raw_id(&self, raw: &str) -> NodeResult<Option<ExpandedNode>> {
        match NodeId::parse(raw) {
            Ok(id) => self.get_expanded_node_with_id(&id).await,
            Err(_) => Ok(None),
        }
    }

    pub async fn get_expanded_root_node(&self) -> NodeResult<ExpandedNode> {
        operations::get_expanded_root_node(&self.ctx).await
    }

    /// Expansion of any subtree, the root sentinel included.
    pub async fn get_expanded_subtree(&self, id: &NodeId) -> NodeResult<Option<ExpandedNode>> {
        if id.is_root() {
            return self.get_expanded_root_node().await.map(Some);
        }
        self.get_expanded_node_with_id(id).await
    }

    pub async fn get_all_nodes(&self) -> NodeResult<Vec<Node>> {
        operations::get_all_nodes(&self.ctx).await
    }

    pub async fn composite_action(&self, actions: &[CompositeAction]) -> NodeResult<Vec<Node>> {
        operations::composite_action(&self.ctx, actions).await
    }

    /// Run a mutating operation by event name with a JSON payload.
    pub async fn dispatch(&self, event: &str, payload: &Value) -> NodeResult<Vec<Node>> {
        operations::dispatch(&self.ctx, event, payload).await
    }

    /// Like [`dispatch`](Self::dispatch), but also reports which subtrees
    /// changed, including the old parents of moved nodes.
    pub async fn dispatch_with_report(&self, event: &str, payload: &Value) -> NodeResult<WriteReport> {
        operations::dispatch_with_report(&self.ctx, event, payload).await
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::in_memory()
    }
}
