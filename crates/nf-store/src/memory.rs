use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use nf_types::{Node, NodeId};
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::NodeStore;

/// In-memory, HashMap-based node store.
///
/// Intended for tests and embedding. Nodes are held behind a `RwLock` and
/// cloned on read and write. Nothing survives a restart.
pub struct InMemoryNodeStore {
    nodes: RwLock<HashMap<NodeId, Node>>,
}

impl InMemoryNodeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with `nodes`.
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            nodes: RwLock::new(nodes.into_iter().map(|n| (n.id, n)).collect()),
        }
    }

    /// Number of nodes currently stored.
    pub fn len(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().expect("lock poisoned").is_empty()
    }

    /// Remove all nodes.
    pub fn clear(&self) {
        self.nodes.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn get_node(&self, id: &NodeId) -> StoreResult<Option<Node>> {
        let map = self.nodes.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    async fn get_children(&self, id: &NodeId) -> StoreResult<Vec<Node>> {
        let map = self.nodes.read().expect("lock poisoned");
        Ok(map.values().filter(|n| &n.parent == id).cloned().collect())
    }

    async fn get_all_nodes(&self) -> StoreResult<Vec<Node>> {
        let map = self.nodes.read().expect("lock poisoned");
        Ok(map.values().cloned().collect())
    }

    async fn upsert_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
        let mut map = self.nodes.write().expect("lock poisoned");
        for node in nodes {
            map.insert(node.id, node.clone());
        }
        debug!(count = nodes.len(), total = map.len(), "memory store upsert");
        Ok(())
    }

    async fn delete_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
        let mut map = self.nodes.write().expect("lock poisoned");
        let removed = nodes.iter().filter(|n| map.remove(&n.id).is_some()).count();
        debug!(requested = nodes.len(), removed, "memory store delete");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryNodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryNodeStore")
            .field("node_count", &self.len())
            .finish()
    }
}
