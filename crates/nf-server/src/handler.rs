use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use nf_events::{names, SubscriptionFilter, TreeEvent};
use nf_types::{ExpandedNode, Node, NodeId};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Event name reported for failed single-node lookups.
pub const NODE_LOOKUP: &str = "node";
/// Event name reported for rejected subscriptions.
pub const SUBSCRIBE: &str = "subscribe";

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    let cache = state.factory.cache();
    Json(json!({
        "name": "node-factory",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
        "started_at": state.started_at.to_rfc3339(),
        "cache": { "entries": cache.len(), "capacity": cache.capacity() },
        "subscribers": state.broadcaster.subscriber_count(),
    }))
}

/// The full tree, as sent in reply to `init`.
pub async fn tree_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let event = state.session().initialize().await?;
    Ok(Json(event.data()))
}

/// Expanded subtree rooted at `id`.
pub async fn node_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<ExpandedNode>, ApiError> {
    let missing = || ApiError::not_found(NODE_LOOKUP, format!("No node with id \"{raw}\"."));
    let Ok(id) = NodeId::parse(&raw) else {
        return Err(missing());
    };
    let expanded = state
        .factory
        .get_expanded_subtree(&id)
        .await
        .map_err(|e| ApiError::new(crate::error::status_for(&e), NODE_LOOKUP, e.to_string()))?;
    expanded.map(Json).ok_or_else(missing)
}

/// Run a mutating event. The body is the event's argument.
pub async fn event_handler(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Vec<Node>>, ApiError> {
    let outcome = state.session().handle(&event, &payload).await?;
    Ok(Json(outcome.nodes))
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
    /// Comma-separated subtree ids; absent means every subtree.
    pub subtree: Option<String>,
}

impl SubscribeParams {
    pub fn filter(&self) -> Result<SubscriptionFilter, ApiError> {
        let Some(raw) = self.subtree.as_deref() else {
            return Ok(SubscriptionFilter::all());
        };
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                NodeId::parse(s)
                    .map_err(|e| ApiError::bad_request(SUBSCRIBE, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SubscriptionFilter::subtrees(ids))
    }
}

fn to_sse(event: &TreeEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .data(event.data().to_string())
}

/// Server-sent event feed: the `init` tree first, then broadcast updates.
pub async fn subscribe_handler(
    State(state): State<AppState>,
    Query(params): Query<SubscribeParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = params.filter()?;
    // Subscribe before reading the tree so no update falls in between.
    let receiver = state.broadcaster.subscribe(filter);
    let init = state.session().initialize().await?;

    let updates = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => Some(event),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "subscriber lagged; events dropped");
            None
        }
    });
    let stream = tokio_stream::once(init)
        .chain(updates)
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Every stored node. Development only.
pub async fn dump_handler(State(state): State<AppState>) -> Result<Json<Vec<Node>>, ApiError> {
    let nodes = state.session().dump().await?;
    Ok(Json(nodes))
}

/// Reported for paths outside the router.
pub async fn fallback_handler() -> ApiError {
    ApiError::not_found(names::ERROR, "No such endpoint.")
}
