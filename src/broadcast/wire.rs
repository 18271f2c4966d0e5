use serde::{Deserialize, Serialize};

use crate::conversations::Thread;
use crate::message::Message;

/// Payload fanned out to topic subscribers.
///
/// Tagged with a `type` discriminant so transport layers can forward the
/// serialized form to clients as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// New chat message appended to a channel.
    Message { channel: String, message: Message },
    /// New thread created on a board.
    NewThread { board: String, thread: ThreadSummary },
    /// Reply appended to an existing thread.
    NewMessage {
        board: String,
        thread_id: String,
        message: Message,
    },
    /// Thread metadata (pin state, tags) changed.
    ThreadUpdated { board: String, thread: ThreadSummary },
}

impl WireEvent {
    #[must_use]
    pub fn channel_message(channel: &str, message: &Message) -> Self {
        Self::Message {
            channel: channel.to_string(),
            message: message.clone(),
        }
    }

    #[must_use]
    pub fn new_thread(board: &str, thread: &Thread) -> Self {
        Self::NewThread {
            board: board.to_string(),
            thread: ThreadSummary::from(thread),
        }
    }

    #[must_use]
    pub fn thread_reply(board: &str, thread_id: &str, message: &Message) -> Self {
        Self::NewMessage {
            board: board.to_string(),
            thread_id: thread_id.to_string(),
            message: message.clone(),
        }
    }

    #[must_use]
    pub fn thread_updated(board: &str, thread: &Thread) -> Self {
        Self::ThreadUpdated {
            board: board.to_string(),
            thread: ThreadSummary::from(thread),
        }
    }
}

/// Compact thread representation for wire payloads: full message bodies stay
/// out of board-level events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub title: String,
    pub first_message: Message,
    pub message_count: usize,
    pub pinned: bool,
    /// Sorted for stable serialized output.
    pub tags: Vec<String>,
}

impl From<&Thread> for ThreadSummary {
    fn from(thread: &Thread) -> Self {
        let mut tags: Vec<String> = thread.tags.iter().cloned().collect();
        tags.sort();
        Self {
            id: thread.id.clone(),
            title: thread.title.clone(),
            first_message: thread.first_message.clone(),
            message_count: thread.messages.len(),
            pinned: thread.pinned,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Wire payloads carry a snake_case `type` tag.
    fn test_event_tagging() {
        let msg = Message::at("alice", "hi", 1.0);
        let event = WireEvent::channel_message("general", &msg);
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "message");
        assert_eq!(json["channel"], "general");
        assert_eq!(json["message"]["author"], "alice");
    }

    #[test]
    fn test_thread_reply_shape() {
        let msg = Message::at("bob", "reply", 2.0);
        let event = WireEvent::thread_reply("ideas", "t-1", &msg);
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["thread_id"], "t-1");
    }
}
