use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all node-factory endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/tree", get(handler::tree_handler))
        .route("/v1/nodes/:id", get(handler::node_handler))
        .route("/v1/events/:event", post(handler::event_handler))
        .route("/v1/subscribe", get(handler::subscribe_handler))
        .route("/v1/dump", get(handler::dump_handler))
        .fallback(handler::fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
