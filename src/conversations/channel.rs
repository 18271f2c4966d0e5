use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// A named chat room: an ordered message log plus a roster of bots allowed
/// to post in it.
///
/// `bot_members` is the sole authority over bot posting rights. Mutation
/// goes through [`ConversationState`](super::ConversationState) so every
/// change is persisted write-through; the fields stay public for read access
/// and for store backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub bot_members: FxHashSet<String>,
}

impl Channel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Vec::new(),
            bot_members: FxHashSet::default(),
        }
    }

    pub(crate) fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Whether the named bot may post in this channel.
    #[must_use]
    pub fn has_bot(&self, name: &str) -> bool {
        self.bot_members.contains(name)
    }

    pub(crate) fn add_bot(&mut self, name: &str) -> bool {
        self.bot_members.insert(name.to_string())
    }

    pub(crate) fn remove_bot(&mut self, name: &str) -> bool {
        self.bot_members.remove(name)
    }

    /// The most recent `limit` messages, oldest first. `limit == 0` returns
    /// the full log.
    #[must_use]
    pub fn tail(&self, limit: usize) -> &[Message] {
        if limit == 0 || limit >= self.messages.len() {
            &self.messages
        } else {
            &self.messages[self.messages.len() - limit..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_roundtrip() {
        let mut channel = Channel::new("general");
        assert!(!channel.has_bot("curator"));
        assert!(channel.add_bot("curator"));
        assert!(!channel.add_bot("curator"));
        assert!(channel.has_bot("curator"));
        assert!(channel.remove_bot("curator"));
        assert!(!channel.has_bot("curator"));
    }

    #[test]
    fn test_tail_bounds() {
        let mut channel = Channel::new("general");
        for i in 0..5 {
            channel.add_message(Message::at("alice", &format!("m{i}"), i as f64));
        }
        assert_eq!(channel.tail(2).len(), 2);
        assert_eq!(channel.tail(2)[0].content, "m3");
        assert_eq!(channel.tail(0).len(), 5);
        assert_eq!(channel.tail(99).len(), 5);
    }
}
