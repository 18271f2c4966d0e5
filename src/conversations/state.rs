use std::collections::hash_map::Entry;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::message::Message;
use crate::store::{Store, StoreError};

use super::{Board, Channel, Thread};

/// Errors surfaced by conversation mutations.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    #[error("bot {bot} is not a member of #{channel}")]
    #[diagnostic(
        code(huddle::conversations::not_a_member),
        help("Grant membership with `add_bot` before the bot posts there.")
    )]
    NotAMember { bot: String, channel: String },

    #[error("no thread {thread_id} on board {board}")]
    #[diagnostic(code(huddle::conversations::unknown_thread))]
    UnknownThread { board: String, thread_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// In-memory channels and boards, persisted write-through to a [`Store`].
///
/// Lookups lazily load from the store (or create a fresh entity when the
/// store has none), so `get_or_create_*` is idempotent and never fails on a
/// missing name. Every mutation saves through the store before returning;
/// the per-map lock is held across the save, which makes appends to any one
/// channel totally ordered and makes the membership check in [`post_as_bot`]
/// atomic with the append.
///
/// [`post_as_bot`]: ConversationState::post_as_bot
pub struct ConversationState {
    channels: Mutex<FxHashMap<String, Channel>>,
    boards: Mutex<FxHashMap<String, Board>>,
    store: Arc<dyn Store>,
}

impl ConversationState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            channels: Mutex::new(FxHashMap::default()),
            boards: Mutex::new(FxHashMap::default()),
            store,
        }
    }

    /// Snapshot of a channel, loading or creating it as needed.
    pub async fn get_or_create_channel(&self, name: &str) -> Result<Channel, StateError> {
        let mut channels = self.channels.lock().await;
        Ok(self.channel_entry(&mut channels, name).await?.clone())
    }

    /// Append a message to a channel and persist the new log.
    pub async fn append_channel_message(
        &self,
        name: &str,
        message: Message,
    ) -> Result<(), StateError> {
        let mut channels = self.channels.lock().await;
        let channel = self.channel_entry(&mut channels, name).await?;
        channel.add_message(message);
        self.store.save_channel(channel).await?;
        Ok(())
    }

    /// Membership-validated append for bot authors.
    ///
    /// The check and the append happen under the same lock acquisition, so a
    /// concurrent `remove_bot` either lands before the check (the post is
    /// refused) or after the save (the post stands). Returns the posted
    /// message on success.
    pub async fn post_as_bot(&self, name: &str, message: Message) -> Result<Message, StateError> {
        let mut channels = self.channels.lock().await;
        let channel = self.channel_entry(&mut channels, name).await?;
        if !channel.has_bot(&message.author) {
            return Err(StateError::NotAMember {
                bot: message.author,
                channel: name.to_string(),
            });
        }
        channel.add_message(message.clone());
        self.store.save_channel(channel).await?;
        Ok(message)
    }

    /// Grant a bot posting rights in a channel.
    pub async fn add_bot(&self, name: &str, bot: &str) -> Result<(), StateError> {
        let mut channels = self.channels.lock().await;
        let channel = self.channel_entry(&mut channels, name).await?;
        if channel.add_bot(bot) {
            self.store.save_channel(channel).await?;
        }
        Ok(())
    }

    /// Revoke a bot's posting rights in a channel.
    pub async fn remove_bot(&self, name: &str, bot: &str) -> Result<(), StateError> {
        let mut channels = self.channels.lock().await;
        let channel = self.channel_entry(&mut channels, name).await?;
        if channel.remove_bot(bot) {
            self.store.save_channel(channel).await?;
        }
        Ok(())
    }

    /// The most recent `limit` messages of a channel, oldest first.
    pub async fn channel_tail(&self, name: &str, limit: usize) -> Result<Vec<Message>, StateError> {
        let mut channels = self.channels.lock().await;
        let channel = self.channel_entry(&mut channels, name).await?;
        Ok(channel.tail(limit).to_vec())
    }

    /// Snapshot of a board, loading or creating it as needed.
    pub async fn get_or_create_board(&self, name: &str) -> Result<Board, StateError> {
        let mut boards = self.boards.lock().await;
        Ok(self.board_entry(&mut boards, name).await?.clone())
    }

    /// Names of all boards known to the store.
    pub async fn board_names(&self) -> Result<Vec<String>, StateError> {
        Ok(self.store.list_boards().await?)
    }

    /// Create a thread seeded with its first message and persist the board.
    pub async fn create_thread(
        &self,
        board: &str,
        title: &str,
        first_message: Message,
    ) -> Result<Thread, StateError> {
        let mut boards = self.boards.lock().await;
        let entry = self.board_entry(&mut boards, board).await?;
        let thread = entry.create_thread(title, first_message);
        self.store.save_board(entry).await?;
        Ok(thread)
    }

    /// Append a reply to a thread and persist the board.
    pub async fn append_thread_message(
        &self,
        board: &str,
        thread_id: &str,
        message: Message,
    ) -> Result<(), StateError> {
        let mut boards = self.boards.lock().await;
        let entry = self.board_entry(&mut boards, board).await?;
        match entry.thread_mut(thread_id) {
            Some(thread) => thread.add_message(message),
            None => {
                return Err(StateError::UnknownThread {
                    board: board.to_string(),
                    thread_id: thread_id.to_string(),
                });
            }
        }
        self.store.save_board(entry).await?;
        Ok(())
    }

    /// Pin or unpin a thread, re-sorting the board. Returns the updated
    /// thread.
    pub async fn set_pinned(
        &self,
        board: &str,
        thread_id: &str,
        pinned: bool,
    ) -> Result<Thread, StateError> {
        self.update_thread(board, thread_id, |thread| thread.pinned = pinned)
            .await
    }

    /// Add tags to a thread, re-sorting the board. Returns the updated
    /// thread.
    pub async fn add_tags(
        &self,
        board: &str,
        thread_id: &str,
        tags: Vec<String>,
    ) -> Result<Thread, StateError> {
        self.update_thread(board, thread_id, |thread| thread.tags.extend(tags))
            .await
    }

    async fn update_thread(
        &self,
        board: &str,
        thread_id: &str,
        apply: impl FnOnce(&mut Thread),
    ) -> Result<Thread, StateError> {
        let mut boards = self.boards.lock().await;
        let entry = self.board_entry(&mut boards, board).await?;
        match entry.thread_mut(thread_id) {
            Some(thread) => apply(thread),
            None => {
                return Err(StateError::UnknownThread {
                    board: board.to_string(),
                    thread_id: thread_id.to_string(),
                });
            }
        }
        entry.resort();
        self.store.save_board(entry).await?;
        let updated = entry
            .thread(thread_id)
            .cloned()
            .ok_or_else(|| StateError::UnknownThread {
                board: board.to_string(),
                thread_id: thread_id.to_string(),
            })?;
        Ok(updated)
    }

    async fn channel_entry<'a>(
        &self,
        channels: &'a mut FxHashMap<String, Channel>,
        name: &str,
    ) -> Result<&'a mut Channel, StateError> {
        match channels.entry(name.to_string()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let loaded = self
                    .store
                    .load_channel(name)
                    .await?
                    .unwrap_or_else(|| Channel::new(name));
                Ok(slot.insert(loaded))
            }
        }
    }

    async fn board_entry<'a>(
        &self,
        boards: &'a mut FxHashMap<String, Board>,
        name: &str,
    ) -> Result<&'a mut Board, StateError> {
        match boards.entry(name.to_string()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let loaded = self
                    .store
                    .load_board(name)
                    .await?
                    .unwrap_or_else(|| Board::new(name));
                Ok(slot.insert(loaded))
            }
        }
    }
}
