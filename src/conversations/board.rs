use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// One discussion thread on a board.
///
/// `messages` is never empty: it always starts with `first_message`, which
/// is kept alongside as a stable preview even as replies accumulate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Unique within the board; stable across re-sorting.
    pub id: String,
    pub title: String,
    pub first_message: Message,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tags: FxHashSet<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Creation time, seconds since the Unix epoch; drives board ordering.
    pub created_at: f64,
}

impl Thread {
    pub(crate) fn new(title: &str, first_message: Message) -> Self {
        let created_at = first_message.timestamp;
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            messages: vec![first_message.clone()],
            first_message,
            tags: FxHashSet::default(),
            pinned: false,
            created_at,
        }
    }

    pub(crate) fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// A named board holding threads in display order.
///
/// Ordering invariant: pinned threads sort before unpinned ones, newest
/// `created_at` first within each group. Every mutation that can affect the
/// order re-sorts before the board is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    #[serde(default)]
    pub threads: Vec<Thread>,
}

impl Board {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            threads: Vec::new(),
        }
    }

    pub(crate) fn create_thread(&mut self, title: &str, first_message: Message) -> Thread {
        let thread = Thread::new(title, first_message);
        self.threads.push(thread.clone());
        self.resort();
        thread
    }

    #[must_use]
    pub fn thread(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub(crate) fn thread_mut(&mut self, id: &str) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.id == id)
    }

    pub(crate) fn resort(&mut self) {
        self.threads.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then(b.created_at.total_cmp(&a.created_at))
        });
    }
}
