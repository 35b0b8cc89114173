use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use nf_core::NodeError;
use nf_events::EventError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] nf_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// A failed request, rendered as `{ "event", "error" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub event: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, event: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            event: event.into(),
            message: message.into(),
        }
    }

    pub fn not_found(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, event, message)
    }

    pub fn bad_request(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, event, message)
    }
}

/// HTTP status for an operation failure.
pub fn status_for(err: &NodeError) -> StatusCode {
    match err {
        NodeError::Validation(_)
        | NodeError::NotAnObject
        | NodeError::ExpectedArray { .. }
        | NodeError::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
        NodeError::ParentMissing { .. } | NodeError::ParentCycle { .. } => StatusCode::CONFLICT,
        NodeError::UnknownEvent(_) => StatusCode::NOT_FOUND,
        NodeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        let status = match err.node_error() {
            Some(source) => status_for(source),
            None => StatusCode::FORBIDDEN,
        };
        Self::new(status, err.event(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(event = %self.event, error = %self.message, "request failed");
        }
        let body = Json(json!({ "event": self.event, "error": self.message }));
        (self.status, body).into_response()
    }
}
