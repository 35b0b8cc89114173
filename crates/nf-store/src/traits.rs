use async_trait::async_trait;
use nf_types::{Node, NodeId};

use crate::error::StoreResult;

/// Durable collection of nodes.
///
/// All implementations must satisfy these invariants:
/// - `get_node` returns exactly what the last `upsert_nodes` wrote for that
///   id, or `None` after a delete.
/// - `get_children` returns every stored node whose `parent` equals the
///   given id, in no particular order.
/// - Bulk writes are keyed by id; the order of nodes in a batch is
///   irrelevant.
/// - The store never validates node contents or parent links.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Fetch one node by id. Returns `Ok(None)` if it does not exist.
    async fn get_node(&self, id: &NodeId) -> StoreResult<Option<Node>>;

    /// Fetch the direct children of a node.
    async fn get_children(&self, id: &NodeId) -> StoreResult<Vec<Node>>;

    /// Fetch every stored node. Intended for debugging only.
    async fn get_all_nodes(&self) -> StoreResult<Vec<Node>>;

    /// Insert or replace the given nodes by id.
    async fn upsert_nodes(&self, nodes: &[Node]) -> StoreResult<()>;

    /// Delete the given nodes by id. Missing ids are ignored.
    async fn delete_nodes(&self, nodes: &[Node]) -> StoreResult<()>;
}
