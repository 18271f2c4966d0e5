use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::sink::Sink;
use super::wire::WireEvent;

/// Key into the broadcast namespace.
///
/// Channels and boards live in separate namespaces: `Topic::channel("x")`
/// and `Topic::board("x")` never collide. The `encode` form (`chat:x`,
/// `board:x`) is what transports use when naming topics over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Channel(String),
    Board(String),
}

impl Topic {
    #[must_use]
    pub fn channel(name: impl Into<String>) -> Self {
        Self::Channel(name.into())
    }

    #[must_use]
    pub fn board(name: impl Into<String>) -> Self {
        Self::Board(name.into())
    }

    /// The bare channel or board name, without the namespace prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Channel(name) | Self::Board(name) => name,
        }
    }

    /// Stable string encoding used by transports: `chat:<name>` or
    /// `board:<name>`.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Channel(name) => format!("chat:{name}"),
            Self::Board(name) => format!("board:{name}"),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Proof of a live subscription; required to unsubscribe.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: Topic,
    id: u64,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

/// Per-topic fan-out of wire events to subscriber sinks.
///
/// The hub guarantees at-least-once delivery to every sink that is alive at
/// publish time. Delivery failure on one sink never blocks the others; a
/// failed sink is pruned so a disconnected subscriber costs at most one
/// failed send per topic it watched.
pub struct BroadcastHub {
    topics: Mutex<FxHashMap<Topic, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

struct Subscriber {
    id: u64,
    sink: Arc<dyn Sink>,
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a sink for a topic. The same sink may be registered on any
    /// number of topics; each registration is a distinct subscription.
    pub fn subscribe(&self, topic: Topic, sink: Arc<dyn Sink>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.lock().expect("hub poisoned");
        topics
            .entry(topic.clone())
            .or_default()
            .push(Subscriber { id, sink });
        SubscriptionHandle { topic, id }
    }

    /// Remove a subscription. Unknown or already-pruned handles are a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut topics = self.topics.lock().expect("hub poisoned");
        if let Some(subscribers) = topics.get_mut(&handle.topic) {
            subscribers.retain(|s| s.id != handle.id);
            if subscribers.is_empty() {
                topics.remove(&handle.topic);
            }
        }
    }

    /// Number of live subscriptions on a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .lock()
            .expect("hub poisoned")
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to every current subscriber of `topic`.
    ///
    /// The subscriber set is snapshotted before delivery, so subscriptions
    /// added or removed mid-publish take effect on the next publish. Failed
    /// sinks are pruned after the delivery round; publishing to a topic with
    /// no subscribers is a no-op.
    pub async fn publish(&self, topic: &Topic, event: &WireEvent) {
        let snapshot: Vec<(u64, Arc<dyn Sink>)> = {
            let topics = self.topics.lock().expect("hub poisoned");
            match topics.get(topic) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|s| (s.id, Arc::clone(&s.sink)))
                    .collect(),
                None => return,
            }
        };

        let deliveries = snapshot
            .iter()
            .map(|(id, sink)| async move { (*id, sink.send(event).await) });

        let mut dead: Vec<u64> = Vec::new();
        for (id, result) in join_all(deliveries).await {
            if let Err(error) = result {
                tracing::debug!(
                    topic = %topic,
                    subscriber = id,
                    %error,
                    "pruning dead subscriber"
                );
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut topics = self.topics.lock().expect("hub poisoned");
            if let Some(subscribers) = topics.get_mut(topic) {
                subscribers.retain(|s| !dead.contains(&s.id));
                if subscribers.is_empty() {
                    topics.remove(topic);
                }
            }
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
