use std::sync::RwLock;

use nf_types::NodeId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::event::TreeEvent;

/// Default capacity of per-subscriber channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Which events a subscriber wants.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// If set, only subtree events for these ids are delivered.
    pub subtrees: Option<Vec<NodeId>>,
}

impl SubscriptionFilter {
    /// Deliver everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Deliver only updates of the given subtrees.
    pub fn subtrees(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            subtrees: Some(ids.into_iter().collect()),
        }
    }

    pub fn matches(&self, event: &TreeEvent) -> bool {
        match (&self.subtrees, event) {
            (Some(ids), TreeEvent::SubtreeUpdated { id, .. }) => ids.contains(id),
            _ => true,
        }
    }
}

/// A receiver of published events.
pub type EventStream = broadcast::Receiver<TreeEvent>;

struct Subscriber {
    filter: SubscriptionFilter,
    sender: broadcast::Sender<TreeEvent>,
}

/// Fan-out router delivering events to every matching subscriber.
///
/// Each subscriber owns a bounded channel; a subscriber that falls behind
/// loses the oldest events (its receiver reports `Lagged`), and one whose
/// receiver was dropped is pruned on the next publish.
pub struct Broadcaster {
    subscribers: RwLock<Vec<Subscriber>>,
    channel_capacity: usize,
}

impl Broadcaster {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Register a subscriber and return its receiver.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.channel_capacity);
        self.subscribers
            .write()
            .expect("broadcaster lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Deliver `event` to all matching subscribers. Returns how many
    /// received it.
    pub fn publish(&self, event: &TreeEvent) -> usize {
        let mut delivered = 0;
        let mut subs = self.subscribers.write().expect("broadcaster lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                let ok = sub.sender.send(event.clone()).is_ok();
                if ok {
                    delivered += 1;
                }
                ok
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        debug!(event = %event.event_name(), delivered, "event published");
        delivered
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("broadcaster lock poisoned")
            .len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}
