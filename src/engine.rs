/*!
The engine: one context object owning the hub, the conversation state, the
budget tracker, and the bot dispatcher.

There are no global singletons; everything a caller (an HTTP handler, a
test, the demo) needs hangs off an [`Engine`] built through
[`EngineBuilder`]. Channel operations follow a fixed order: append and
persist, broadcast to subscribers, then hand the message to bot dispatch
without awaiting the bots.
*/

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::bots::{BotDispatcher, BotProfile, ToolRegistry};
use crate::broadcast::{BroadcastHub, Sink, SubscriptionHandle, Topic, WireEvent};
use crate::budget::{BudgetError, TokenBudget, TokenBudgetTracker};
use crate::config::EngineConfig;
use crate::conversations::{Board, Channel, ConversationState, StateError, Thread};
use crate::generator::Generator;
use crate::message::Message;
use crate::store::Store;

/// Errors surfaced by engine operations.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Budget(#[from] BudgetError),
}

/// Errors surfaced while building an [`Engine`].
#[derive(Debug, Error, Diagnostic)]
pub enum EngineBuildError {
    #[error("an Engine requires a Store")]
    #[diagnostic(
        code(huddle::engine::missing_store),
        help("Call `with_store` with e.g. InMemoryStore or JsonFileStore before `build`.")
    )]
    MissingStore,

    #[error("an Engine requires a Generator")]
    #[diagnostic(
        code(huddle::engine::missing_generator),
        help("Call `with_generator` with your LLM backend before `build`.")
    )]
    MissingGenerator,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Budget(#[from] BudgetError),
}

/// The assembled collaboration engine.
pub struct Engine {
    state: Arc<ConversationState>,
    hub: Arc<BroadcastHub>,
    budget: Arc<TokenBudgetTracker>,
    dispatcher: Arc<BotDispatcher>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ConversationState> {
        &self.state
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    #[must_use]
    pub fn budget(&self) -> &Arc<TokenBudgetTracker> {
        &self.budget
    }

    /// Post a message into a channel.
    ///
    /// The message is appended and persisted, broadcast to the channel
    /// topic, then handed to bot dispatch. Dispatch spawns detached units;
    /// this method never waits for bot replies.
    #[tracing::instrument(skip(self, content))]
    pub async fn post_channel_message(
        &self,
        channel: &str,
        author: &str,
        content: &str,
    ) -> Result<Message, EngineError> {
        let message = Message::new(author, content);
        self.state
            .append_channel_message(channel, message.clone())
            .await?;
        self.hub
            .publish(
                &Topic::channel(channel),
                &WireEvent::channel_message(channel, &message),
            )
            .await;
        self.dispatcher.on_new_message(channel, &message).await;
        Ok(message)
    }

    /// Create a thread on a board and broadcast it to the board topic.
    #[tracing::instrument(skip(self, content, tags))]
    pub async fn create_thread(
        &self,
        board: &str,
        title: &str,
        author: &str,
        content: &str,
        tags: Vec<String>,
    ) -> Result<Thread, EngineError> {
        let first_message = Message::new(author, content);
        let mut thread = self.state.create_thread(board, title, first_message).await?;
        if !tags.is_empty() {
            thread = self.state.add_tags(board, &thread.id, tags).await?;
        }
        self.hub
            .publish(&Topic::board(board), &WireEvent::new_thread(board, &thread))
            .await;
        Ok(thread)
    }

    /// Reply to an existing thread and broadcast the reply.
    #[tracing::instrument(skip(self, content))]
    pub async fn post_thread_reply(
        &self,
        board: &str,
        thread_id: &str,
        author: &str,
        content: &str,
    ) -> Result<Message, EngineError> {
        let message = Message::new(author, content);
        self.state
            .append_thread_message(board, thread_id, message.clone())
            .await?;
        self.hub
            .publish(
                &Topic::board(board),
                &WireEvent::thread_reply(board, thread_id, &message),
            )
            .await;
        Ok(message)
    }

    /// Pin or unpin a thread; broadcasts the updated metadata.
    pub async fn set_thread_pinned(
        &self,
        board: &str,
        thread_id: &str,
        pinned: bool,
    ) -> Result<Thread, EngineError> {
        let thread = self.state.set_pinned(board, thread_id, pinned).await?;
        self.hub
            .publish(
                &Topic::board(board),
                &WireEvent::thread_updated(board, &thread),
            )
            .await;
        Ok(thread)
    }

    /// Tag a thread; broadcasts the updated metadata.
    pub async fn add_thread_tags(
        &self,
        board: &str,
        thread_id: &str,
        tags: Vec<String>,
    ) -> Result<Thread, EngineError> {
        let thread = self.state.add_tags(board, thread_id, tags).await?;
        self.hub
            .publish(
                &Topic::board(board),
                &WireEvent::thread_updated(board, &thread),
            )
            .await;
        Ok(thread)
    }

    /// Snapshot of a channel, created on first reference.
    pub async fn channel(&self, name: &str) -> Result<Channel, EngineError> {
        Ok(self.state.get_or_create_channel(name).await?)
    }

    /// Snapshot of a board, created on first reference.
    pub async fn board(&self, name: &str) -> Result<Board, EngineError> {
        Ok(self.state.get_or_create_board(name).await?)
    }

    /// Grant a bot posting rights in a channel.
    pub async fn add_bot(&self, channel: &str, bot: &str) -> Result<(), EngineError> {
        Ok(self.state.add_bot(channel, bot).await?)
    }

    /// Revoke a bot's posting rights in a channel.
    pub async fn remove_bot(&self, channel: &str, bot: &str) -> Result<(), EngineError> {
        Ok(self.state.remove_bot(channel, bot).await?)
    }

    pub fn subscribe(&self, topic: Topic, sink: Arc<dyn Sink>) -> SubscriptionHandle {
        self.hub.subscribe(topic, sink)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.hub.unsubscribe(handle);
    }

    pub async fn set_provider_budget(
        &self,
        provider: &str,
        budget: TokenBudget,
    ) -> Result<(), EngineError> {
        Ok(self.budget.set_provider_budget(provider, budget).await?)
    }

    pub async fn set_model_budget(
        &self,
        provider: &str,
        model: &str,
        budget: TokenBudget,
    ) -> Result<(), EngineError> {
        Ok(self.budget.set_model_budget(provider, model, budget).await?)
    }

    pub async fn usage_report(&self) -> serde_json::Value {
        self.budget.usage_report().await
    }
}

/// Assembles an [`Engine`] from its collaborators.
///
/// A store and a generator are required; bots, tools and config are
/// optional (no bots means a channels-and-boards engine that never talks
/// to the generator).
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn Store>>,
    generator: Option<Arc<dyn Generator>>,
    bots: Vec<BotProfile>,
    tools: Option<ToolRegistry>,
    config: Option<EngineConfig>,
}

impl EngineBuilder {
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn with_bot(mut self, bot: BotProfile) -> Self {
        self.bots.push(bot);
        self
    }

    #[must_use]
    pub fn with_bots(mut self, bots: impl IntoIterator<Item = BotProfile>) -> Self {
        self.bots.extend(bots);
        self
    }

    /// Replace the built-in tool registry.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Wire everything together, loading persisted budget state from the
    /// store.
    pub async fn build(self) -> Result<Engine, EngineBuildError> {
        let store = self.store.ok_or(EngineBuildError::MissingStore)?;
        let generator = self.generator.ok_or(EngineBuildError::MissingGenerator)?;
        let config = self.config.unwrap_or_default();

        let state = Arc::new(ConversationState::new(Arc::clone(&store)));
        let hub = Arc::new(BroadcastHub::new());
        let budget = Arc::new(TokenBudgetTracker::load(store).await?);
        let tools = Arc::new(self.tools.unwrap_or_else(ToolRegistry::builtin));
        let dispatcher = Arc::new(BotDispatcher::new(
            self.bots,
            Arc::clone(&state),
            Arc::clone(&hub),
            Arc::clone(&budget),
            generator,
            tools,
            config.max_tokens,
            config.history_window,
        ));

        Ok(Engine {
            state,
            hub,
            budget,
            dispatcher,
        })
    }
}
