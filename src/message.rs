use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single utterance in a channel or thread.
///
/// Messages are immutable once created: edits are modeled as new messages,
/// never mutation of an existing one. The author is a plain display name;
/// human and bot authors share the same shape.
///
/// # Examples
///
/// ```
/// use huddle::message::Message;
///
/// let msg = Message::new("alice", "hello, world");
/// assert_eq!(msg.author, "alice");
/// assert_eq!(msg.content, "hello, world");
/// assert!(msg.timestamp > 0.0);
/// ```
///
/// # Serialization
///
/// Messages implement `Serialize` and `Deserialize` for JSON/other formats:
/// ```
/// use huddle::message::Message;
///
/// let msg = Message::at("alice", "test", 1_700_000_000.5);
/// let json = serde_json::to_string(&msg).unwrap();
/// let parsed: Message = serde_json::from_str(&json).unwrap();
/// assert_eq!(msg, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The text content of the message.
    pub content: String,
    /// Display name of the author (human or bot).
    pub author: String,
    /// Wall-clock creation time, seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Message {
    /// Creates a new message stamped with the current wall-clock time.
    #[must_use]
    pub fn new(author: &str, content: &str) -> Self {
        Self::at(author, content, now_seconds())
    }

    /// Creates a message with an explicit timestamp.
    ///
    /// Useful for replaying persisted history or constructing fixtures with
    /// controlled ordering.
    #[must_use]
    pub fn at(author: &str, content: &str, timestamp: f64) -> Self {
        Self {
            content: content.to_string(),
            author: author.to_string(),
            timestamp,
        }
    }

    /// Returns true if this message was written by the given author.
    #[must_use]
    pub fn authored_by(&self, author: &str) -> bool {
        self.author == author
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub(crate) fn now_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
