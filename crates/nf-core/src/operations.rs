//! Factory operations.
//!
//! Every function takes the [`FactoryContext`] explicitly. Reads prefer the
//! cache and fall back to the store; writes go to the store first and are
//! then mirrored into the cache.
//!
//! Cache entries hold copies of their subtrees, so a change to one node is
//! also embedded in every cached ancestor. After patching a parent's
//! `children` list, every cached ancestor above that parent is evicted and
//! will be re-expanded from the store on the next read.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use nf_types::{
    validate_and_format_node, ExpandedNode, Node, NodeCandidate, NodeField, NodeId,
    ValidationError,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::FactoryContext;
use crate::error::{NodeError, NodeResult};
use crate::factory::{CompositeAction, Operation};

/// Boxed future used by the recursive walks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Leaf nodes never have children; traversals stop at them.
pub fn is_leaf_node(node: &Node) -> bool {
    node.node_type.is_leaf()
}

/// Nodes written by a mutating operation, plus the subtrees it changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteReport {
    pub nodes: Vec<Node>,
    /// Parents whose `children` changed, in first-seen order. A moved node
    /// contributes both its new and its old parent.
    pub affected_parents: Vec<NodeId>,
}

impl WriteReport {
    fn touch(&mut self, parent: NodeId) {
        if !self.affected_parents.contains(&parent) {
            self.affected_parents.push(parent);
        }
    }

    fn append(&mut self, other: WriteReport) {
        self.nodes.extend(other.nodes);
        for parent in other.affected_parents {
            self.touch(parent);
        }
    }
}

/// Look up a node's persisted fields, preferring the cache.
pub async fn get_cached_node_or_fetch(
    ctx: &FactoryContext,
    id: &NodeId,
) -> NodeResult<Option<Node>> {
    if let Some(node) = ctx.cache.get(id).and_then(|entry| entry.to_node()) {
        return Ok(Some(node));
    }
    Ok(ctx.store.get_node(id).await?)
}

// ---------------------------------------------------------------------------
// Upsert
// ---------------------------------------------------------------------------

struct Prepared {
    node: Node,
    /// The stored node this one replaces, if any.
    previous: Option<Node>,
}

/// Parent links already staged by the batch being prepared.
type Staged = HashMap<NodeId, NodeId>;

async fn prepare(
    ctx: &FactoryContext,
    candidate: &NodeCandidate,
    staged: &Staged,
) -> NodeResult<Option<Prepared>> {
    let previous = match candidate.parsed_id() {
        Some(id) if !id.is_root() => get_cached_node_or_fetch(ctx, &id).await?,
        _ => None,
    };

    let merged = match (&previous, &candidate.id) {
        (Some(existing), _) => candidate.merged_over(existing),
        (None, None) => candidate.clone().with_id(NodeId::generate()),
        (None, Some(_)) => candidate.clone(),
    };
    let node = validate_and_format_node(&merged)?;

    if previous.as_ref() == Some(&node) {
        debug!(id = %node.id, "node unchanged; skipping upsert");
        return Ok(None);
    }

    if !node.parent.is_root() && get_cached_node_or_fetch(ctx, &node.parent).await?.is_none() {
        return Err(NodeError::ParentMissing {
            id: node.id,
            parent: node.parent,
        });
    }

    let reparented = previous.as_ref().map_or(true, |p| p.parent != node.parent);
    if reparented {
        check_acyclic(ctx, &node, staged).await?;
    }

    Ok(Some(Prepared { node, previous }))
}

/// Reject a parent that is the node itself or one of its descendants.
///
/// Ancestry is read through `staged` first, so links written earlier in the
/// same batch count.
async fn check_acyclic(ctx: &FactoryContext, node: &Node, staged: &Staged) -> NodeResult<()> {
    let mut seen = HashSet::new();
    let mut cursor = node.parent;
    while !cursor.is_root() && seen.insert(cursor) {
        if cursor == node.id {
            return Err(NodeError::ParentCycle {
                id: node.id,
                parent: node.parent,
            });
        }
        if let Some(parent) = staged.get(&cursor) {
            cursor = *parent;
            continue;
        }
        match get_cached_node_or_fetch(ctx, &cursor).await? {
            Some(ancestor) => cursor = ancestor.parent,
            None => break,
        }
    }
    Ok(())
}

/// Resolve a candidate into the node that would be written.
///
/// Fields present on the candidate override those of the existing node with
/// the same id, so `{id, value}` is a valid partial update. A candidate
/// without an id gets a fresh one. Returns `Ok(None)` when the result is
/// identical to what is stored.
pub async fn prepare_for_upsertion(
    ctx: &FactoryContext,
    candidate: &NodeCandidate,
) -> NodeResult<Option<Node>> {
    Ok(prepare(ctx, candidate, &Staged::new()).await?.map(|p| p.node))
}

/// Validate, write and cache a batch of nodes.
///
/// Every candidate is prepared before anything is written, so one bad
/// candidate rejects the whole batch. Unchanged nodes are dropped; if the
/// same id appears more than once the last occurrence wins. Returns the
/// nodes actually written.
pub async fn upsert_nodes(ctx: &FactoryContext, candidates: &[NodeCandidate]) -> NodeResult<Vec<Node>> {
    Ok(upsert(ctx, candidates).await?.nodes)
}

/// Keep only the last candidate for each id. Candidates without a usable id
/// are all kept.
fn last_per_id(candidates: &[NodeCandidate]) -> Vec<&NodeCandidate> {
    let mut last: HashMap<NodeId, usize> = HashMap::new();
    for (i, candidate) in candidates.iter().enumerate() {
        if let Some(id) = candidate.parsed_id() {
            last.insert(id, i);
        }
    }
    candidates
        .iter()
        .enumerate()
        .filter(|(i, c)| c.parsed_id().map_or(true, |id| last.get(&id) == Some(i)))
        .map(|(_, c)| c)
        .collect()
}

async fn upsert(ctx: &FactoryContext, candidates: &[NodeCandidate]) -> NodeResult<WriteReport> {
    let mut batch: Vec<Prepared> = Vec::new();
    let mut staged = Staged::new();
    for candidate in last_per_id(candidates) {
        if let Some(prepared) = prepare(ctx, candidate, &staged).await? {
            staged.insert(prepared.node.id, prepared.node.parent);
            batch.push(prepared);
        }
    }

    if batch.is_empty() {
        debug!(requested = candidates.len(), "nothing to upsert");
        return Ok(WriteReport::default());
    }

    let nodes: Vec<Node> = batch.iter().map(|p| p.node.clone()).collect();
    ctx.store.upsert_nodes(&nodes).await?;
    debug!(count = nodes.len(), "upserted nodes");

    let mut report = WriteReport::default();
    let mut patched = Vec::new();
    for Prepared { node, previous } in &batch {
        report.touch(node.parent);
        if let Some(prev) = previous.as_ref().filter(|p| p.parent != node.parent) {
            report.touch(prev.parent);
        }
        patched.extend(write_through(ctx, node, previous.as_ref()));
    }
    evict_ancestors(ctx, patched).await;

    report.nodes = nodes;
    Ok(report)
}

/// Mirror a written node into the cache. Returns the ids of the parents
/// whose cached `children` lists were patched.
fn write_through(ctx: &FactoryContext, node: &Node, previous: Option<&Node>) -> Vec<NodeId> {
    let cache = &ctx.cache;

    let children = match previous {
        None => Some(Vec::new()),
        Some(prev) => cache.peek(&node.id).map(|entry| entry.children).or_else(|| {
            cache
                .peek(&prev.parent)
                .and_then(|p| p.child(&node.id).map(|c| c.children.clone()))
        }),
    };

    let mut patched = vec![node.parent];
    if let Some(prev) = previous.filter(|p| p.parent != node.parent) {
        cache.update(&prev.parent, |p| {
            p.remove_child(&node.id);
        });
        patched.push(prev.parent);
    }

    match children {
        Some(children) => {
            let expanded = node.clone().expand(children);
            cache.update(&node.parent, |p| p.upsert_child(expanded.clone()));
            cache.set(expanded);
        }
        None => {
            // Subtree unknown: drop the parent's copy instead of guessing.
            cache.delete(&node.parent);
        }
    }
    debug!(id = %node.id, parent = %node.parent, "cache write-through");
    patched
}

/// Evict every cached ancestor strictly above each of `starts`.
///
/// If an ancestor cannot be looked up the whole cache is dropped, which is
/// always safe.
async fn evict_ancestors(ctx: &FactoryContext, starts: Vec<NodeId>) {
    let mut visited = HashSet::new();
    for start in starts {
        let mut cursor = start;
        while !cursor.is_root() && visited.insert(cursor) {
            let parent = match ctx.cache.peek(&cursor).and_then(|entry| entry.parent) {
                Some(parent) => Some(parent),
                None => match ctx.store.get_node(&cursor).await {
                    Ok(found) => found.map(|n| n.parent),
                    Err(e) => {
                        warn!(id = %cursor, error = %e, "ancestor lookup failed; clearing tree cache");
                        ctx.cache.clear();
                        return;
                    }
                },
            };
            match parent {
                Some(parent) if !parent.is_root() => {
                    ctx.cache.delete(&parent);
                    cursor = parent;
                }
                _ => break,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Delete nodes and, transitively, all of their descendants.
///
/// Only `id` is read from each candidate. Missing nodes are skipped.
/// Returns the explicitly requested nodes that existed, deduplicated;
/// descendants are deleted but not reported.
pub async fn delete_nodes(ctx: &FactoryContext, candidates: &[NodeCandidate]) -> NodeResult<Vec<Node>> {
    Ok(delete(ctx, candidates).await?.nodes)
}

async fn delete(ctx: &FactoryContext, candidates: &[NodeCandidate]) -> NodeResult<WriteReport> {
    let ids = candidates
        .iter()
        .map(|c| {
            c.parsed_id()
                .filter(|id| !id.is_root())
                .ok_or_else(|| ValidationError::new(NodeField::Id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut requested: Vec<Node> = Vec::new();
    let mut doomed: Vec<Node> = Vec::new();
    let mut seen = HashSet::new();
    for id in ids {
        let subtree = get_node_and_transitive_children(ctx, &id).await?;
        if let Some(top) = subtree.first() {
            if !requested.iter().any(|n| n.id == top.id) {
                requested.push(top.clone());
            }
        }
        doomed.extend(subtree.into_iter().filter(|n| seen.insert(n.id)));
    }

    for node in &doomed {
        ctx.cache.delete(&node.id);
        ctx.cache.update(&node.parent, |p| {
            p.remove_child(&node.id);
        });
    }

    if doomed.is_empty() {
        debug!(requested = candidates.len(), "nothing to delete");
        return Ok(WriteReport::default());
    }

    ctx.store.delete_nodes(&doomed).await?;
    debug!(requested = requested.len(), deleted = doomed.len(), "deleted nodes");

    let surviving_parents = doomed
        .iter()
        .map(|n| n.parent)
        .filter(|p| !seen.contains(p))
        .collect();
    evict_ancestors(ctx, surviving_parents).await;

    let mut report = WriteReport::default();
    for node in &requested {
        report.touch(node.parent);
    }
    report.nodes = requested;
    Ok(report)
}

/// The node with the given id followed by all of its descendants.
///
/// A cached expansion is trusted as-is. Returns an empty list if the node
/// does not exist.
pub async fn get_node_and_transitive_children(
    ctx: &FactoryContext,
    id: &NodeId,
) -> NodeResult<Vec<Node>> {
    if let Some(entry) = ctx.cache.get(id) {
        return Ok(entry.flatten());
    }
    match ctx.store.get_node(id).await? {
        Some(node) => collect_subtree(ctx, node).await,
        None => Ok(Vec::new()),
    }
}

fn collect_subtree(ctx: &FactoryContext, node: Node) -> BoxFuture<'_, NodeResult<Vec<Node>>> {
    Box::pin(async move {
        if is_leaf_node(&node) {
            return Ok(vec![node]);
        }
        let children = ctx.store.get_children(&node.id).await?;
        let mut out = vec![node];
        for child in children {
            match ctx.cache.get(&child.id) {
                Some(entry) => out.extend(entry.flatten()),
                None => out.extend(collect_subtree(ctx, child).await?),
            }
        }
        Ok(out)
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// The node with its full subtree, or `None` if it does not exist.
///
/// Expansions built from the store are cached on the way back up.
pub async fn get_expanded_node_with_id(
    ctx: &FactoryContext,
    id: &NodeId,
) -> NodeResult<Option<ExpandedNode>> {
    expand(ctx, *id).await
}

fn expand(ctx: &FactoryContext, id: NodeId) -> BoxFuture<'_, NodeResult<Option<ExpandedNode>>> {
    Box::pin(async move {
        if let Some(entry) = ctx.cache.get(&id) {
            return Ok(Some(entry));
        }
        let Some(node) = ctx.store.get_node(&id).await? else {
            return Ok(None);
        };

        let children = if is_leaf_node(&node) {
            Vec::new()
        } else {
            expand_children(ctx, &id).await?
        };

        let expanded = node.expand(children);
        ctx.cache.set(expanded.clone());
        Ok(Some(expanded))
    })
}

async fn expand_children(ctx: &FactoryContext, id: &NodeId) -> NodeResult<Vec<ExpandedNode>> {
    let mut children = Vec::new();
    for child in ctx.store.get_children(id).await? {
        match expand(ctx, child.id).await? {
            Some(expanded) => children.push(expanded),
            None => debug!(id = %child.id, "child vanished during expansion"),
        }
    }
    Ok(children)
}

/// The synthesized root with every top-level subtree expanded.
pub async fn get_expanded_root_node(ctx: &FactoryContext) -> NodeResult<ExpandedNode> {
    let children = expand_children(ctx, &NodeId::ROOT).await?;
    Ok(ExpandedNode::root(children))
}

/// Every stored node. Debugging aid.
pub async fn get_all_nodes(ctx: &FactoryContext) -> NodeResult<Vec<Node>> {
    Ok(ctx.store.get_all_nodes().await?)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run a sequence of named operations in order and concatenate their
/// results. A failing action stops the sequence; earlier actions stay
/// applied.
pub async fn composite_action(
    ctx: &FactoryContext,
    actions: &[CompositeAction],
) -> NodeResult<Vec<Node>> {
    Ok(composite(ctx, actions).await?.nodes)
}

async fn composite(ctx: &FactoryContext, actions: &[CompositeAction]) -> NodeResult<WriteReport> {
    let null = Value::Null;
    let mut report = WriteReport::default();
    for action in actions {
        let payload = action.args.first().unwrap_or(&null);
        report.append(dispatch_with_report(ctx, &action.event, payload).await?);
    }
    Ok(report)
}

/// Run the operation registered under `event` with a JSON payload.
///
/// The payload of every operation is an array: nodes for `upsertNodes` and
/// `deleteNodes`, `{event, args}` actions for `compositeAction`.
pub async fn dispatch(ctx: &FactoryContext, event: &str, payload: &Value) -> NodeResult<Vec<Node>> {
    Ok(dispatch_with_report(ctx, event, payload).await?.nodes)
}

/// Like [`dispatch`], but also reports which subtrees changed.
pub fn dispatch_with_report<'a>(
    ctx: &'a FactoryContext,
    event: &'a str,
    payload: &'a Value,
) -> BoxFuture<'a, NodeResult<WriteReport>> {
    Box::pin(async move {
        let operation =
            Operation::from_name(event).ok_or_else(|| NodeError::UnknownEvent(event.to_string()))?;
        let items = payload
            .as_array()
            .ok_or(NodeError::ExpectedArray { operation })?;

        match operation {
            Operation::UpsertNodes => {
                let candidates = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(_) => {
                            NodeCandidate::deserialize(item).map_err(|_| NodeError::NotAnObject)
                        }
                        _ => Err(NodeError::NotAnObject),
                    })
                    .collect::<NodeResult<Vec<_>>>()?;
                upsert(ctx, &candidates).await
            }
            Operation::DeleteNodes => {
                // Anything that is not a node object has no usable id and
                // fails id validation.
                let candidates: Vec<NodeCandidate> = items
                    .iter()
                    .map(|item| NodeCandidate::deserialize(item).unwrap_or_default())
                    .collect();
                delete(ctx, &candidates).await
            }
            Operation::CompositeAction => {
                let actions = items
                    .iter()
                    .map(|item| {
                        CompositeAction::deserialize(item).map_err(|e| NodeError::InvalidArguments {
                            event: event.to_string(),
                            reason: e.to_string(),
                        })
                    })
                    .collect::<NodeResult<Vec<_>>>()?;
                composite(ctx, &actions).await
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use nf_store::{InMemoryNodeStore, NodeStore, StoreError, StoreResult};
    use nf_types::NodeType;
    use serde_json::json;

    use crate::cache::TreeCache;

    /// In-memory store that counts reads and can be told to fail writes.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryNodeStore,
        reads: AtomicUsize,
        writes: AtomicUsize,
        fail_writes: bool,
    }

    impl CountingStore {
        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn write_guard(&self) -> StoreResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(StoreError::Io(std::io::Error::other("disk on fire")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl NodeStore for CountingStore {
        async fn get_node(&self, id: &NodeId) -> StoreResult<Option<Node>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_node(id).await
        }

        async fn get_children(&self, id: &NodeId) -> StoreResult<Vec<Node>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_children(id).await
        }

        async fn get_all_nodes(&self) -> StoreResult<Vec<Node>> {
            self.inner.get_all_nodes().await
        }

        async fn upsert_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
            self.write_guard()?;
            self.inner.upsert_nodes(nodes).await
        }

        async fn delete_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
            self.write_guard()?;
            self.inner.delete_nodes(nodes).await
        }
    }

    struct Fixture {
        store: Arc<CountingStore>,
        ctx: FactoryContext,
    }

    fn fixture() -> Fixture {
        fixture_with(CountingStore::default())
    }

    fn fixture_with(store: CountingStore) -> Fixture {
        let store = Arc::new(store);
        let ctx = FactoryContext::new(store.clone(), Arc::new(TreeCache::default()));
        Fixture { store, ctx }
    }

    fn factory(parent: NodeId, label: &str) -> Node {
        Node::new(NodeId::generate(), NodeType::Factory, parent, label)
    }

    fn number(parent: NodeId, value: i64) -> Node {
        Node::new(NodeId::generate(), NodeType::Number, parent, value)
    }

    fn new_factory(parent: NodeId, label: &str) -> NodeCandidate {
        NodeCandidate::new()
            .with_type(NodeType::Factory)
            .with_parent(parent)
            .with_value(label)
    }

    fn by_id(id: NodeId) -> NodeCandidate {
        NodeCandidate::new().with_id(id)
    }

    fn sorted(mut nodes: Vec<Node>) -> Vec<Node> {
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[test]
    fn leaf_detection_follows_type() {
        assert!(!is_leaf_node(&factory(NodeId::ROOT, "f")));
        assert!(is_leaf_node(&number(NodeId::ROOT, 1)));
        let root_typed = Node::new(NodeId::generate(), NodeType::Root, NodeId::ROOT, "r");
        assert!(!is_leaf_node(&root_typed));
    }

    #[tokio::test]
    async fn cached_node_or_fetch_falls_back_to_store() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "stored");
        fx.store.inner.upsert_nodes(&[node.clone()]).await.unwrap();

        let found = get_cached_node_or_fetch(&fx.ctx, &node.id).await.unwrap();
        assert_eq!(found, Some(node));
        assert_eq!(fx.store.reads(), 1);
    }

    #[tokio::test]
    async fn cached_node_or_fetch_prefers_cache() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "cached only");
        fx.ctx.cache.set(node.clone().into());

        let found = get_cached_node_or_fetch(&fx.ctx, &node.id).await.unwrap();
        assert_eq!(found, Some(node));
        assert_eq!(fx.store.reads(), 0);
    }

    // -----------------------------------------------------------------------
    // prepare_for_upsertion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn prepare_unchanged_node_is_noop() {
        let fx = fixture();
        let parent = factory(NodeId::generate(), "parent");
        let node = factory(parent.id, "factory node");
        fx.ctx.cache.set(parent.into());
        fx.ctx.cache.set(node.clone().into());

        let prepared = prepare_for_upsertion(&fx.ctx, &NodeCandidate::from(&node))
            .await
            .unwrap();
        assert_eq!(prepared, None);
    }

    #[tokio::test]
    async fn prepare_merges_partial_update() {
        let fx = fixture();
        let parent = factory(NodeId::generate(), "parent");
        let node = factory(parent.id, "factory node");
        fx.ctx.cache.set(parent.into());
        fx.ctx.cache.set(node.clone().into());

        let update = by_id(node.id).with_value("new value");
        let prepared = prepare_for_upsertion(&fx.ctx, &update).await.unwrap().unwrap();

        let mut expected = node;
        expected.value = "new value".into();
        assert_eq!(prepared, expected);
    }

    #[tokio::test]
    async fn prepare_generates_id_for_new_node() {
        let fx = fixture();
        let parent = factory(NodeId::generate(), "parent");
        fx.ctx.cache.set(parent.clone().into());

        let prepared = prepare_for_upsertion(&fx.ctx, &new_factory(parent.id, "factory node"))
            .await
            .unwrap()
            .unwrap();
        assert!(!prepared.id.is_root());
        assert_eq!(prepared.parent, parent.id);
        assert_eq!(prepared.node_type, NodeType::Factory);
        assert_eq!(prepared.value, "factory node");
    }

    #[tokio::test]
    async fn prepare_keeps_caller_supplied_id() {
        let fx = fixture();
        let id = NodeId::generate();
        let candidate = new_factory(NodeId::ROOT, "x").with_id(id);
        let prepared = prepare_for_upsertion(&fx.ctx, &candidate).await.unwrap().unwrap();
        assert_eq!(prepared.id, id);
    }

    #[tokio::test]
    async fn prepare_rejects_missing_parent() {
        let fx = fixture();
        let err = prepare_for_upsertion(&fx.ctx, &new_factory(NodeId::generate(), "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::ParentMissing { .. }));
        assert_eq!(
            err.to_string(),
            "Cannot upsert node, since its parent node doesn't exist."
        );
    }

    #[tokio::test]
    async fn prepare_reports_validation_errors() {
        let fx = fixture();
        let candidate = new_factory(NodeId::ROOT, "x").with_value(12);
        let err = prepare_for_upsertion(&fx.ctx, &candidate).await.unwrap_err();
        match err {
            NodeError::Validation(v) => assert_eq!(v.field, NodeField::Value),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn prepare_rejects_root_as_id() {
        let fx = fixture();
        let candidate = new_factory(NodeId::ROOT, "x").with_id(NodeId::ROOT);
        let err = prepare_for_upsertion(&fx.ctx, &candidate).await.unwrap_err();
        assert!(matches!(err, NodeError::Validation(ref v) if v.field == NodeField::Id));
    }

    #[tokio::test]
    async fn prepare_rejects_cycles() {
        let fx = fixture();
        let a = factory(NodeId::ROOT, "a");
        let b = factory(a.id, "b");
        let c = factory(b.id, "c");
        fx.store.inner.upsert_nodes(&[a.clone(), b, c.clone()]).await.unwrap();

        let under_grandchild = by_id(a.id).with_parent(c.id);
        let err = prepare_for_upsertion(&fx.ctx, &under_grandchild).await.unwrap_err();
        assert!(matches!(err, NodeError::ParentCycle { .. }));

        let under_itself = by_id(a.id).with_parent(a.id);
        let err = prepare_for_upsertion(&fx.ctx, &under_itself).await.unwrap_err();
        assert!(matches!(err, NodeError::ParentCycle { .. }));
    }

    #[tokio::test]
    async fn upsert_rejects_cycle_within_batch() {
        let fx = fixture();
        let a = factory(NodeId::ROOT, "a");
        let b = factory(NodeId::ROOT, "b");
        fx.store.inner.upsert_nodes(&[a.clone(), b.clone()]).await.unwrap();

        // Each move is fine alone; together they would link a and b to each other.
        let swap = [by_id(a.id).with_parent(b.id), by_id(b.id).with_parent(a.id)];
        let err = upsert_nodes(&fx.ctx, &swap).await.unwrap_err();
        assert!(matches!(err, NodeError::ParentCycle { id, .. } if id == b.id));

        assert_eq!(fx.store.inner.get_node(&a.id).await.unwrap(), Some(a));
        assert_eq!(fx.store.inner.get_node(&b.id).await.unwrap(), Some(b));
        let root = get_expanded_root_node(&fx.ctx).await.unwrap();
        assert_eq!(root.children.len(), 2);
    }

    #[tokio::test]
    async fn upsert_accepts_chain_built_within_batch() {
        let fx = fixture();
        let a = factory(NodeId::ROOT, "a");
        let b = factory(NodeId::ROOT, "b");
        let c = factory(NodeId::ROOT, "c");
        fx.store
            .inner
            .upsert_nodes(&[a.clone(), b.clone(), c.clone()])
            .await
            .unwrap();

        let chain = [by_id(b.id).with_parent(a.id), by_id(c.id).with_parent(b.id)];
        let written = upsert_nodes(&fx.ctx, &chain).await.unwrap();
        assert_eq!(written.len(), 2);

        let flat = get_node_and_transitive_children(&fx.ctx, &a.id).await.unwrap();
        assert_eq!(flat.len(), 3);
    }

    // -----------------------------------------------------------------------
    // upsert_nodes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upsert_writes_and_caches() {
        let fx = fixture();
        let candidates: Vec<NodeCandidate> = ["foo", "bar", "baz"]
            .into_iter()
            .map(|label| new_factory(NodeId::ROOT, label))
            .collect();

        let results = upsert_nodes(&fx.ctx, &candidates).await.unwrap();
        let labels: Vec<&Value> = results.iter().map(|n| &n.value).collect();
        assert_eq!(labels, vec!["foo", "bar", "baz"]);

        for node in &results {
            assert_eq!(fx.ctx.cache.peek(&node.id), Some(node.clone().expand(vec![])));
            assert_eq!(fx.store.inner.get_node(&node.id).await.unwrap().as_ref(), Some(node));
        }
        assert_eq!(fx.store.writes(), 1);
    }

    #[tokio::test]
    async fn upsert_unchanged_node_skips_store() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        fx.ctx.cache.set(node.clone().into());

        let results = upsert_nodes(&fx.ctx, &[NodeCandidate::from(&node)]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(fx.store.writes(), 0);
        assert_eq!(fx.ctx.cache.peek(&node.id), Some(node.into()));
    }

    #[tokio::test]
    async fn upsert_empty_batch() {
        let fx = fixture();
        assert!(upsert_nodes(&fx.ctx, &[]).await.unwrap().is_empty());
        assert_eq!(fx.store.writes(), 0);
    }

    #[tokio::test]
    async fn upsert_appends_to_cached_parent() {
        let fx = fixture();
        let parent = factory(NodeId::ROOT, "foo");
        fx.store.inner.upsert_nodes(&[parent.clone()]).await.unwrap();
        fx.ctx.cache.set(parent.clone().into());

        let results = upsert_nodes(&fx.ctx, &[new_factory(parent.id, "bar")]).await.unwrap();
        assert_eq!(results.len(), 1);
        let child = &results[0];
        assert_eq!(child.value, "bar");

        let cached_parent = fx.ctx.cache.peek(&parent.id).unwrap();
        assert_eq!(cached_parent.children, vec![child.clone().expand(vec![])]);
    }

    #[tokio::test]
    async fn upsert_replaces_child_in_cached_parent() {
        let fx = fixture();
        let parent = factory(NodeId::ROOT, "foo");
        let child = factory(parent.id, "bar");
        let sibling = number(parent.id, 3);
        fx.store
            .inner
            .upsert_nodes(&[parent.clone(), child.clone(), sibling.clone()])
            .await
            .unwrap();
        fx.ctx.cache.set(parent.clone().expand(vec![
            child.clone().into(),
            sibling.clone().into(),
        ]));

        let results = upsert_nodes(&fx.ctx, &[by_id(child.id).with_value("modified")])
            .await
            .unwrap();

        let mut modified = child.clone();
        modified.value = "modified".into();
        assert_eq!(results, vec![modified.clone()]);

        let cached_parent = fx.ctx.cache.peek(&parent.id).unwrap();
        assert_eq!(
            cached_parent.children,
            vec![modified.clone().into(), sibling.into()]
        );
        assert_eq!(
            fx.store.inner.get_node(&child.id).await.unwrap().unwrap().value,
            "modified"
        );
    }

    #[tokio::test]
    async fn upsert_keeps_cached_children_of_updated_node() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        let child = number(node.id, 1);
        fx.store.inner.upsert_nodes(&[node.clone(), child.clone()]).await.unwrap();
        fx.ctx.cache.set(node.clone().expand(vec![child.clone().into()]));

        upsert_nodes(&fx.ctx, &[by_id(node.id).with_value("renamed")])
            .await
            .unwrap();

        let cached = fx.ctx.cache.peek(&node.id).unwrap();
        assert_eq!(cached.value, "renamed");
        assert_eq!(cached.children, vec![child.into()]);
    }

    #[tokio::test]
    async fn upsert_missing_parent_leaves_store_untouched() {
        let fx = fixture();
        let ok = new_factory(NodeId::ROOT, "fine");
        let orphan = new_factory(NodeId::generate(), "orphan");

        let err = upsert_nodes(&fx.ctx, &[ok, orphan]).await.unwrap_err();
        assert!(matches!(err, NodeError::ParentMissing { .. }));
        assert_eq!(fx.store.writes(), 0);
        assert!(fx.store.inner.is_empty());
        assert!(fx.ctx.cache.is_empty());
    }

    #[tokio::test]
    async fn upsert_parent_and_child_in_one_batch_is_rejected() {
        let fx = fixture();
        let parent_id = NodeId::generate();
        let parent = new_factory(NodeId::ROOT, "parent").with_id(parent_id);
        let child = new_factory(parent_id, "child");

        let err = upsert_nodes(&fx.ctx, &[parent, child]).await.unwrap_err();
        assert!(matches!(err, NodeError::ParentMissing { .. }));
        assert!(fx.store.inner.is_empty());
    }

    #[tokio::test]
    async fn upsert_duplicate_ids_last_wins() {
        let fx = fixture();
        let id = NodeId::generate();
        let first = new_factory(NodeId::ROOT, "first").with_id(id);
        let second = new_factory(NodeId::ROOT, "second").with_id(id);

        let results = upsert_nodes(&fx.ctx, &[first, second]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, "second");
        assert_eq!(fx.store.inner.len(), 1);
    }

    #[tokio::test]
    async fn upsert_duplicate_ids_last_wins_even_when_unchanged() {
        let fx = fixture();
        let stored = factory(NodeId::ROOT, "orig");
        fx.store.inner.upsert_nodes(&[stored.clone()]).await.unwrap();

        let batch = [
            by_id(stored.id).with_value("changed"),
            by_id(stored.id).with_value("orig"),
        ];
        let results = upsert_nodes(&fx.ctx, &batch).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(fx.store.inner.get_node(&stored.id).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn move_reports_old_and_new_parent() {
        let fx = fixture();
        let old_parent = factory(NodeId::ROOT, "old");
        let new_parent = factory(NodeId::ROOT, "new");
        let child = number(old_parent.id, 3);
        fx.store
            .inner
            .upsert_nodes(&[old_parent.clone(), new_parent.clone(), child.clone()])
            .await
            .unwrap();

        let payload = json!([{ "id": child.id.to_string(), "parent": new_parent.id.to_string() }]);
        let report = dispatch_with_report(&fx.ctx, "upsertNodes", &payload).await.unwrap();
        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.affected_parents, vec![new_parent.id, old_parent.id]);

        // A plain update only touches its own parent.
        let payload = json!([{ "id": child.id.to_string(), "value": 4 }]);
        let report = dispatch_with_report(&fx.ctx, "upsertNodes", &payload).await.unwrap();
        assert_eq!(report.affected_parents, vec![new_parent.id]);
    }

    #[tokio::test]
    async fn composite_report_merges_parents() {
        let fx = fixture();
        let p = factory(NodeId::ROOT, "p");
        fx.store.inner.upsert_nodes(&[p.clone()]).await.unwrap();

        let payload = json!([
            { "event": "upsertNodes", "args": [[{ "type": "number", "value": 1, "parent": p.id.to_string() }]] },
            { "event": "upsertNodes", "args": [[{ "type": "number", "value": 2, "parent": p.id.to_string() }]] },
            { "event": "deleteNodes", "args": [[{ "id": p.id.to_string() }]] },
        ]);
        let report = dispatch_with_report(&fx.ctx, "compositeAction", &payload).await.unwrap();
        assert_eq!(report.nodes.len(), 3);
        assert_eq!(report.affected_parents, vec![p.id, NodeId::ROOT]);
    }

    #[tokio::test]
    async fn upsert_move_updates_both_parents() {
        let fx = fixture();
        let old_parent = factory(NodeId::ROOT, "old");
        let new_parent = factory(NodeId::ROOT, "new");
        let child = number(old_parent.id, 9);
        fx.store
            .inner
            .upsert_nodes(&[old_parent.clone(), new_parent.clone(), child.clone()])
            .await
            .unwrap();
        fx.ctx.cache.set(old_parent.clone().expand(vec![child.clone().into()]));
        fx.ctx.cache.set(new_parent.clone().into());

        upsert_nodes(&fx.ctx, &[by_id(child.id).with_parent(new_parent.id)])
            .await
            .unwrap();

        let mut moved = child.clone();
        moved.parent = new_parent.id;
        assert!(fx.ctx.cache.peek(&old_parent.id).unwrap().children.is_empty());
        assert_eq!(
            fx.ctx.cache.peek(&new_parent.id).unwrap().children,
            vec![moved.into()]
        );
    }

    #[tokio::test]
    async fn upsert_evicts_stale_ancestors() {
        let fx = fixture();
        let grandparent = factory(NodeId::ROOT, "gp");
        let parent = factory(grandparent.id, "p");
        fx.store
            .inner
            .upsert_nodes(&[grandparent.clone(), parent.clone()])
            .await
            .unwrap();

        // Prime the cache with both expansions.
        get_expanded_node_with_id(&fx.ctx, &grandparent.id).await.unwrap();
        assert!(fx.ctx.cache.contains(&grandparent.id));
        assert!(fx.ctx.cache.contains(&parent.id));

        let results = upsert_nodes(&fx.ctx, &[new_factory(parent.id, "c")]).await.unwrap();
        let child = results[0].clone();

        assert!(!fx.ctx.cache.contains(&grandparent.id));
        let fresh = get_expanded_node_with_id(&fx.ctx, &grandparent.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.children[0].children, vec![child.into()]);
    }

    #[tokio::test]
    async fn store_failure_is_passed_through_and_cache_untouched() {
        let fx = fixture_with(CountingStore {
            fail_writes: true,
            ..CountingStore::default()
        });
        let err = upsert_nodes(&fx.ctx, &[new_factory(NodeId::ROOT, "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Store(StoreError::Io(_))));
        assert!(!err.is_caller_error());
        assert!(fx.ctx.cache.is_empty());
    }

    #[tokio::test]
    async fn upsert_then_expand_round_trips_fields() {
        let fx = fixture();
        let written = upsert_nodes(&fx.ctx, &[new_factory(NodeId::ROOT, "round trip")])
            .await
            .unwrap()
            .remove(0);

        fx.ctx.cache.clear();
        let expanded = get_expanded_node_with_id(&fx.ctx, &written.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expanded.to_node(), Some(written));
    }

    // -----------------------------------------------------------------------
    // get_node_and_transitive_children
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transitive_children_from_cache() {
        let fx = fixture();
        let node = factory(NodeId::generate(), "node");
        let child = factory(node.id, "child");
        let grandchild = factory(child.id, "grandchild");
        fx.ctx.cache.set(node.clone().expand(vec![
            child.clone().expand(vec![grandchild.clone().into()]),
        ]));

        let results = get_node_and_transitive_children(&fx.ctx, &node.id).await.unwrap();
        assert_eq!(results, vec![node, child, grandchild]);
        assert_eq!(fx.store.reads(), 0);
    }

    #[tokio::test]
    async fn transitive_children_from_store() {
        let fx = fixture();
        let node = factory(NodeId::generate(), "node");
        let child = factory(node.id, "child");
        let grandchild = factory(child.id, "grandchild");
        fx.store
            .inner
            .upsert_nodes(&[node.clone(), child.clone(), grandchild.clone()])
            .await
            .unwrap();

        let results = get_node_and_transitive_children(&fx.ctx, &node.id).await.unwrap();
        assert_eq!(results, vec![node, child, grandchild]);
    }

    #[tokio::test]
    async fn transitive_children_stop_at_leaves() {
        let fx = fixture();
        let container = factory(NodeId::ROOT, "container");
        fx.store.inner.upsert_nodes(&[container.clone()]).await.unwrap();
        let leaf = upsert_nodes(
            &fx.ctx,
            &[NodeCandidate::new()
                .with_type(NodeType::Number)
                .with_parent(container.id)
                .with_value(15)],
        )
        .await
        .unwrap()
        .remove(0);
        fx.ctx.cache.clear();

        let before = fx.store.reads();
        let results = get_node_and_transitive_children(&fx.ctx, &container.id)
            .await
            .unwrap();
        assert_eq!(results, vec![container, leaf]);
        // get_node(container), get_children(container); nothing for the leaf.
        assert_eq!(fx.store.reads() - before, 2);
    }

    #[tokio::test]
    async fn transitive_children_of_missing_node() {
        let fx = fixture();
        let results = get_node_and_transitive_children(&fx.ctx, &NodeId::generate())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    // -----------------------------------------------------------------------
    // delete_nodes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_empty_batch() {
        let fx = fixture();
        assert!(delete_nodes(&fx.ctx, &[]).await.unwrap().is_empty());
        assert_eq!(fx.store.writes(), 0);
    }

    #[tokio::test]
    async fn delete_single_node() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        fx.store.inner.upsert_nodes(&[node.clone()]).await.unwrap();
        fx.ctx.cache.set(node.clone().into());

        let results = delete_nodes(&fx.ctx, &[by_id(node.id)]).await.unwrap();
        assert_eq!(results, vec![node.clone()]);
        assert!(fx.store.inner.is_empty());
        assert!(fx.ctx.cache.get(&node.id).is_none());
    }

    #[tokio::test]
    async fn delete_cascades_but_reports_top_level_only() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        let child = factory(node.id, "child");
        let leaf = number(child.id, 4);
        fx.store
            .inner
            .upsert_nodes(&[node.clone(), child.clone(), leaf.clone()])
            .await
            .unwrap();
        get_expanded_node_with_id(&fx.ctx, &node.id).await.unwrap();
        assert_eq!(fx.ctx.cache.len(), 3);

        let results = delete_nodes(&fx.ctx, &[by_id(node.id)]).await.unwrap();
        assert_eq!(results, vec![node.clone()]);

        for id in [node.id, child.id, leaf.id] {
            assert!(fx.store.inner.get_node(&id).await.unwrap().is_none());
            assert!(!fx.ctx.cache.contains(&id));
        }
    }

    #[tokio::test]
    async fn delete_child_patches_parent_cache() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        let child = factory(node.id, "bar");
        let sibling = factory(node.id, "baz");
        fx.store
            .inner
            .upsert_nodes(&[node.clone(), child.clone(), sibling.clone()])
            .await
            .unwrap();
        fx.ctx.cache.set(node.clone().expand(vec![
            child.clone().into(),
            sibling.clone().into(),
        ]));
        fx.ctx.cache.set(child.clone().into());

        let results = delete_nodes(&fx.ctx, &[by_id(child.id)]).await.unwrap();
        assert_eq!(results, vec![child.clone()]);

        assert_eq!(
            fx.ctx.cache.peek(&node.id).unwrap().children,
            vec![sibling.into()]
        );
        assert!(fx.store.inner.get_node(&node.id).await.unwrap().is_some());
        assert_eq!(fx.store.inner.len(), 2);
    }

    #[tokio::test]
    async fn delete_overlapping_subtrees_once() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        let child = factory(node.id, "bar");
        fx.store.inner.upsert_nodes(&[node.clone(), child.clone()]).await.unwrap();

        let results = delete_nodes(&fx.ctx, &[by_id(node.id), by_id(child.id), by_id(node.id)])
            .await
            .unwrap();
        assert_eq!(sorted(results), sorted(vec![node, child]));
        assert_eq!(fx.store.writes(), 1);
        assert!(fx.store.inner.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_node_is_noop() {
        let fx = fixture();
        let results = delete_nodes(&fx.ctx, &[by_id(NodeId::generate())]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(fx.store.writes(), 0);
    }

    #[tokio::test]
    async fn delete_requires_valid_ids() {
        let fx = fixture();
        let err = delete_nodes(&fx.ctx, &[NodeCandidate::new()]).await.unwrap_err();
        assert!(matches!(err, NodeError::Validation(ref v) if v.field == NodeField::Id));

        let err = delete_nodes(&fx.ctx, &[by_id(NodeId::ROOT)]).await.unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn all_nodes() {
        let fx = fixture();
        assert!(get_all_nodes(&fx.ctx).await.unwrap().is_empty());

        upsert_nodes(&fx.ctx, &[new_factory(NodeId::ROOT, "foo")]).await.unwrap();
        let all = get_all_nodes(&fx.ctx).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, "foo");
    }

    #[tokio::test]
    async fn expanded_root_without_children() {
        let fx = fixture();
        let root = get_expanded_root_node(&fx.ctx).await.unwrap();
        assert_eq!(
            serde_json::to_value(&root).unwrap(),
            json!({
                "id": NodeId::ROOT.to_string(),
                "type": "root",
                "parent": null,
                "value": "root",
                "children": [],
            })
        );
    }

    #[tokio::test]
    async fn expanded_root_lists_top_level_nodes() {
        let fx = fixture();
        let a = number(NodeId::ROOT, 2);
        let b = number(NodeId::ROOT, 1);
        fx.store.inner.upsert_nodes(&[a.clone(), b.clone()]).await.unwrap();

        let root = get_expanded_root_node(&fx.ctx).await.unwrap();
        let mut children = root.children.clone();
        children.sort_by_key(|c| c.id);
        let mut expected: Vec<ExpandedNode> = vec![a.into(), b.into()];
        expected.sort_by_key(|c| c.id);
        assert_eq!(children, expected);
        assert!(!fx.ctx.cache.contains(&NodeId::ROOT));
    }

    #[tokio::test]
    async fn expanded_node_from_cache() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        let child = factory(node.id, "bar");
        let expanded = node.clone().expand(vec![child.into()]);
        fx.ctx.cache.set(expanded.clone());

        let result = get_expanded_node_with_id(&fx.ctx, &node.id).await.unwrap();
        assert_eq!(result, Some(expanded));
        assert_eq!(fx.store.reads(), 0);
    }

    #[tokio::test]
    async fn expanded_node_from_store_is_cached() {
        let fx = fixture();
        let node = factory(NodeId::ROOT, "foo");
        let child = factory(node.id, "bar");
        fx.store.inner.upsert_nodes(&[node.clone(), child.clone()]).await.unwrap();

        let result = get_expanded_node_with_id(&fx.ctx, &node.id).await.unwrap().unwrap();
        assert_eq!(result, node.clone().expand(vec![child.clone().into()]));
        assert_eq!(fx.ctx.cache.peek(&node.id), Some(result));
        assert!(fx.ctx.cache.contains(&child.id));
    }

    #[tokio::test]
    async fn expanded_missing_node_is_none() {
        let fx = fixture();
        assert!(get_expanded_node_with_id(&fx.ctx, &NodeId::generate())
            .await
            .unwrap()
            .is_none());
        assert!(get_expanded_node_with_id(&fx.ctx, &NodeId::ROOT)
            .await
            .unwrap()
            .is_none());
    }

    // -----------------------------------------------------------------------
    // dispatch / composite_action
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn composite_action_flattens_results() {
        let fx = fixture();
        let node = json!({ "value": "foo", "type": "factory", "parent": NodeId::ROOT.to_string() });
        let actions = vec![
            CompositeAction::new(Operation::UpsertNodes, json!([node.clone()])),
            CompositeAction::new(Operation::UpsertNodes, json!([node])),
        ];

        let results = composite_action(&fx.ctx, &actions).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(fx.store.inner.len(), 2);
        assert_eq!(fx.ctx.cache.len(), 2);
    }

    #[tokio::test]
    async fn composite_action_runs_in_order() {
        let fx = fixture();
        let parent_id = NodeId::generate();
        let payload = json!([
            { "event": "upsertNodes", "args": [[{
                "id": parent_id.to_string(), "type": "factory",
                "parent": NodeId::ROOT.to_string(), "value": "parent",
            }]] },
            { "event": "upsertNodes", "args": [[{
                "type": "number", "parent": parent_id.to_string(), "value": 1,
            }]] },
            { "event": "deleteNodes", "args": [[{ "id": parent_id.to_string() }]] },
        ]);

        let results = dispatch(&fx.ctx, "compositeAction", &payload).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(fx.store.inner.is_empty());
    }

    #[tokio::test]
    async fn dispatch_requires_arrays() {
        let fx = fixture();
        let err = dispatch(&fx.ctx, "upsertNodes", &Value::Null).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "`upsertNodes` expected an array of nodes to upsert."
        );
        let err = dispatch(&fx.ctx, "deleteNodes", &json!({})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "`deleteNodes` requires an array of nodes to delete."
        );
    }

    #[tokio::test]
    async fn dispatch_rejects_non_object_nodes() {
        let fx = fixture();
        let err = dispatch(&fx.ctx, "upsertNodes", &json!([7])).await.unwrap_err();
        assert!(matches!(err, NodeError::NotAnObject));
    }

    #[tokio::test]
    async fn dispatch_unknown_event() {
        let fx = fixture();
        let err = dispatch(&fx.ctx, "dropTables", &json!([])).await.unwrap_err();
        assert!(matches!(err, NodeError::UnknownEvent(ref e) if e == "dropTables"));
    }

    #[tokio::test]
    async fn dispatch_bad_composite_action() {
        let fx = fixture();
        let err = dispatch(&fx.ctx, "compositeAction", &json!([{ "args": [] }]))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidArguments { .. }));
    }
}
