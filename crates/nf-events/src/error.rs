use nf_core::NodeError;

use crate::event::TreeEvent;

/// Errors produced while handling a client event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The operation behind `event` failed. Displays the operation's
    /// message verbatim so it can be shown to the client.
    #[error("{source}")]
    Failed {
        event: String,
        #[source]
        source: NodeError,
    },

    /// `dump` was requested in a production environment.
    #[error("dump is disabled in production")]
    DumpDisabled,
}

impl EventError {
    pub(crate) fn failed(event: impl Into<String>, source: NodeError) -> Self {
        Self::Failed {
            event: event.into(),
            source,
        }
    }

    /// Name of the event that failed.
    pub fn event(&self) -> &str {
        match self {
            Self::Failed { event, .. } => event,
            Self::DumpDisabled => crate::event::names::DUMP,
        }
    }

    /// The underlying operation error, if any.
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            Self::Failed { source, .. } => Some(source),
            Self::DumpDisabled => None,
        }
    }

    /// The `err` event reporting this failure to the originating client.
    pub fn to_event(&self) -> TreeEvent {
        TreeEvent::Error {
            event: self.event().to_string(),
            error: self.to_string(),
        }
    }
}

/// Result alias for event handling.
pub type EventResult<T> = Result<T, EventError>;
