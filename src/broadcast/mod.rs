/*!
Topic-based fan-out of collaboration events.

The [`BroadcastHub`] owns per-topic subscriber sets and delivers
[`WireEvent`] payloads to every registered [`Sink`]. Topics separate the
channel and board namespaces; sinks are the seam where SSE/WebSocket
transports plug in without the engine knowing about them.

Delivery semantics: at-least-once to every sink alive at publish time,
per-sink failure isolation, automatic pruning of dead sinks.
*/

mod hub;
mod sink;
mod wire;

pub use hub::{BroadcastHub, SubscriptionHandle, Topic};
pub use sink::{ChannelSink, MemorySink, Sink, SinkError};
pub use wire::{ThreadSummary, WireEvent};
