use nf_core::{NodeFactory, NodeResult};
use nf_types::{Node, NodeId};
use tracing::debug;

use crate::broadcaster::Broadcaster;
use crate::event::TreeEvent;

/// Announce the subtrees changed by an operation.
///
/// Every distinct parent among `touched` (in first-seen order) is
/// re-expanded and announced; see [`broadcast_subtree_updates`].
pub async fn broadcast_node_update(
    factory: &NodeFactory,
    broadcaster: &Broadcaster,
    touched: &[Node],
) -> NodeResult<Vec<TreeEvent>> {
    let mut parents: Vec<NodeId> = Vec::new();
    for node in touched {
        if !parents.contains(&node.parent) {
            parents.push(node.parent);
        }
    }
    broadcast_subtree_updates(factory, broadcaster, &parents).await
}

/// Publish one `nodeWasUpdated:<id>` event per subtree in `ids`.
///
/// The root sentinel is expanded through the synthesized root. Subtrees
/// that no longer exist are skipped. Returns the published events.
pub async fn broadcast_subtree_updates(
    factory: &NodeFactory,
    broadcaster: &Broadcaster,
    ids: &[NodeId],
) -> NodeResult<Vec<TreeEvent>> {
    let mut events = Vec::with_capacity(ids.len());
    for &id in ids {
        match factory.get_expanded_subtree(&id).await? {
            Some(node) => {
                let event = TreeEvent::SubtreeUpdated { id, node };
                broadcaster.publish(&event);
                events.push(event);
            }
            None => debug!(%id, "parent vanished before broadcast; skipping"),
        }
    }
    Ok(events)
}
