use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nf_core::NodeFactory;
use nf_types::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broadcast::broadcast_subtree_updates;
use crate::broadcaster::Broadcaster;
use crate::error::{EventError, EventResult};
use crate::event::{names, TreeEvent};

/// Deployment environment. Debug-only events are refused in production.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            // Anything else is treated as a development build.
            _ => Ok(Self::Development),
        }
    }
}

/// Result of a successful mutating event.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// Nodes written or deleted by the operation.
    pub nodes: Vec<Node>,
    /// Subtree events published as a consequence.
    pub events: Vec<TreeEvent>,
}

/// Event handling for one connected client.
///
/// Mutating events run through the shared factory and, on success, are
/// broadcast to every subscriber. Failures are reported back to this
/// client only, as an `err` event.
#[derive(Clone, Debug)]
pub struct Session {
    id: Uuid,
    factory: NodeFactory,
    broadcaster: Arc<Broadcaster>,
    environment: Environment,
}

impl Session {
    pub fn new(factory: NodeFactory, broadcaster: Arc<Broadcaster>, environment: Environment) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, %environment, "session opened");
        Self {
            id,
            factory,
            broadcaster,
            environment,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Reply to `init` with the full tree.
    pub async fn initialize(&self) -> EventResult<TreeEvent> {
        let root = self
            .factory
            .get_expanded_root_node()
            .await
            .map_err(|e| EventError::failed(names::INIT, e))?;
        Ok(TreeEvent::Initialized(root))
    }

    /// Run a mutating event and broadcast the affected subtrees.
    pub async fn handle(&self, event: &str, payload: &Value) -> EventResult<Outcome> {
        debug!(session = %self.id, event, "incoming event");
        let result = self.run(event, payload).await;
        if let Err(ref e) = result {
            warn!(session = %self.id, event, error = %e, "event failed");
        }
        result
    }

    async fn run(&self, event: &str, payload: &Value) -> EventResult<Outcome> {
        let report = self
            .factory
            .dispatch_with_report(event, payload)
            .await
            .map_err(|e| EventError::failed(event, e))?;
        let events =
            broadcast_subtree_updates(&self.factory, &self.broadcaster, &report.affected_parents)
                .await
                .map_err(|e| EventError::failed(event, e))?;
        Ok(Outcome {
            nodes: report.nodes,
            events,
        })
    }

    /// Every stored node. Refused in production.
    pub async fn dump(&self) -> EventResult<Vec<Node>> {
        if self.environment.is_production() {
            return Err(EventError::DumpDisabled);
        }
        self.factory
            .get_all_nodes()
            .await
            .map_err(|e| EventError::failed(names::DUMP, e))
    }
}
