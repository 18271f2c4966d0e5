use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use super::wire::WireEvent;

/// Delivery failure reported by a sink.
///
/// The hub treats any error as a dead subscriber and prunes it; sinks should
/// not return recoverable errors.
#[derive(Debug, Error, Diagnostic)]
pub enum SinkError {
    #[error("sink closed: {0}")]
    #[diagnostic(
        code(huddle::broadcast::sink_closed),
        help("The subscriber went away; the hub removes the subscription automatically.")
    )]
    Closed(String),
}

/// Abstraction over an output target that consumes published wire events.
///
/// One sink per live subscriber connection. Implementations decide how to
/// frame and forward the event (SSE, WebSocket, test capture, ...).
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, event: &WireEvent) -> Result<(), SinkError>;
}

/// Channel-based sink for streaming to async consumers (e.g., web clients).
///
/// Events are forwarded into a flume channel without blocking. The sink fails
/// `Closed` once the receiver is dropped, which is how client disconnects
/// surface to the hub.
pub struct ChannelSink {
    tx: flume::Sender<WireEvent>,
}

impl ChannelSink {
    /// Create a new channel sink.
    ///
    /// # Example
    /// ```no_run
    /// use std::sync::Arc;
    /// use huddle::broadcast::{BroadcastHub, ChannelSink, Topic};
    ///
    /// let (tx, rx) = flume::unbounded();
    /// let hub = BroadcastHub::new();
    /// hub.subscribe(Topic::channel("general"), Arc::new(ChannelSink::new(tx)));
    ///
    /// // In another task, consume events:
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv_async().await {
    ///         println!("{}", serde_json::to_string(&event).unwrap());
    ///     }
    /// });
    /// ```
    pub fn new(tx: flume::Sender<WireEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn send(&self, event: &WireEvent) -> Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .map_err(|_| SinkError::Closed("channel receiver dropped".into()))
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<WireEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all captured events.
    pub fn snapshot(&self) -> Vec<WireEvent> {
        self.entries.lock().expect("sink poisoned").clone()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.entries.lock().expect("sink poisoned").clear();
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&self, event: &WireEvent) -> Result<(), SinkError> {
        self.entries
            .lock()
            .expect("sink poisoned")
            .push(event.clone());
        Ok(())
    }
}
