use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::broadcast::{BroadcastHub, Topic, WireEvent};
use crate::budget::{BudgetError, TokenBudgetTracker};
use crate::conversations::{ConversationState, StateError};
use crate::generator::{
    Completion, GenerationRequest, Generator, GeneratorError, PromptMessage,
};
use crate::message::Message;

use super::mentions::scan_mentions;
use super::profile::BotProfile;
use super::tools::{ToolContext, ToolRegistry};

/// Anything that can end a bot-response unit early.
///
/// Units are detached tasks; these never propagate past the spawn boundary,
/// where they are logged and dropped.
#[derive(Debug, Error, Diagnostic)]
pub enum BotUnitError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),
}

/// Fans a triggering message out to eligible bots as detached response
/// units.
///
/// Eligibility: a bot replies when it is a member of the channel and the
/// message mentions it (directly or via `@all`). One narrow bootstrap
/// exception: a message containing the word "join" plus a direct mention of
/// a known non-member bot adds that bot to the channel roster first, then
/// dispatches it.
pub struct BotDispatcher {
    bots: FxHashMap<String, Arc<BotProfile>>,
    state: Arc<ConversationState>,
    hub: Arc<BroadcastHub>,
    budget: Arc<TokenBudgetTracker>,
    generator: Arc<dyn Generator>,
    tools: Arc<ToolRegistry>,
    max_tokens: u32,
    history_window: usize,
}

impl BotDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bots: Vec<BotProfile>,
        state: Arc<ConversationState>,
        hub: Arc<BroadcastHub>,
        budget: Arc<TokenBudgetTracker>,
        generator: Arc<dyn Generator>,
        tools: Arc<ToolRegistry>,
        max_tokens: u32,
        history_window: usize,
    ) -> Self {
        Self {
            bots: bots
                .into_iter()
                .map(|bot| (bot.name.clone(), Arc::new(bot)))
                .collect(),
            state,
            hub,
            budget,
            generator,
            tools,
            max_tokens,
            history_window,
        }
    }

    /// Registered bot names, sorted.
    #[must_use]
    pub fn roster(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bots.keys().cloned().collect();
        names.sort();
        names
    }

    /// React to a freshly appended channel message.
    ///
    /// Resolves eligibility, then spawns one detached task per eligible bot
    /// and returns. The caller never awaits unit completion; a unit that
    /// fails logs at its own boundary and posts nothing.
    #[tracing::instrument(skip(self, message), fields(author = %message.author))]
    pub async fn on_new_message(&self, channel: &str, message: &Message) {
        let scan = scan_mentions(&message.content);
        if scan.is_empty() {
            return;
        }

        let roster = match self.state.get_or_create_channel(channel).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(%error, "could not resolve channel for bot dispatch");
                return;
            }
        };

        let mut picked: FxHashSet<&str> = FxHashSet::default();
        let mut eligible: Vec<Arc<BotProfile>> = Vec::new();

        if scan.mentions_all {
            for (name, bot) in &self.bots {
                if roster.has_bot(name) && picked.insert(name.as_str()) {
                    eligible.push(Arc::clone(bot));
                }
            }
        }

        for name in &scan.mentioned {
            let Some(bot) = self.bots.get(name) else {
                continue;
            };
            if !picked.contains(name.as_str()) && roster.has_bot(name) {
                picked.insert(name.as_str());
                eligible.push(Arc::clone(bot));
            } else if !roster.has_bot(name) && scan.offers_join {
                match self.state.add_bot(channel, name).await {
                    Ok(()) => {
                        tracing::info!(bot = %name, channel, "bot joined via invite");
                        picked.insert(name.as_str());
                        eligible.push(Arc::clone(bot));
                    }
                    Err(error) => {
                        tracing::warn!(bot = %name, %error, "join invite failed");
                    }
                }
            }
        }

        for bot in eligible {
            let unit = BotUnit {
                bot,
                channel: channel.to_string(),
                state: Arc::clone(&self.state),
                hub: Arc::clone(&self.hub),
                budget: Arc::clone(&self.budget),
                generator: Arc::clone(&self.generator),
                tools: Arc::clone(&self.tools),
                max_tokens: self.max_tokens,
                history_window: self.history_window,
            };
            tokio::spawn(async move {
                if let Err(error) = unit.run().await {
                    tracing::warn!(%error, "bot response unit failed");
                }
            });
        }
    }
}

/// One bot's reaction to one triggering message, run as a detached task.
struct BotUnit {
    bot: Arc<BotProfile>,
    channel: String,
    state: Arc<ConversationState>,
    hub: Arc<BroadcastHub>,
    budget: Arc<TokenBudgetTracker>,
    generator: Arc<dyn Generator>,
    tools: Arc<ToolRegistry>,
    max_tokens: u32,
    history_window: usize,
}

impl BotUnit {
    #[tracing::instrument(skip(self), fields(bot = %self.bot.name, channel = %self.channel))]
    async fn run(self) -> Result<(), BotUnitError> {
        let admission = self
            .budget
            .check_admission(&self.bot.provider, &self.bot.model)
            .await;
        if !admission.allowed {
            tracing::debug!(
                reason = admission.reason.as_deref().unwrap_or_default(),
                "budget refused admission, staying silent"
            );
            return Ok(());
        }

        let mut prompt = self.build_prompt().await?;
        let request = GenerationRequest::new(prompt.clone())
            .with_tools(self.tools.specs())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.bot.temperature);
        let first = self.generator.generate(request).await?;
        let status = self.record(&first).await?;

        let mut reply = first.content.clone();
        if !first.tool_calls.is_empty() {
            if !status.within_budget {
                tracing::debug!(
                    reason = status.reason.as_deref().unwrap_or_default(),
                    "budget exhausted mid-unit, skipping tool round"
                );
            } else {
                let ctx = ToolContext {
                    bot_name: self.bot.name.clone(),
                    channel: self.channel.clone(),
                    state: Arc::clone(&self.state),
                    hub: Arc::clone(&self.hub),
                };
                if !first.content.is_empty() {
                    prompt.push(PromptMessage::assistant(&first.content));
                }
                for call in &first.tool_calls {
                    let output = self.tools.dispatch(&ctx, call).await;
                    prompt.push(PromptMessage::tool(&format!("{}: {output}", call.name)));
                }
                // Follow-up round runs without tools so it must produce text.
                let follow = GenerationRequest::new(prompt)
                    .with_max_tokens(self.max_tokens)
                    .with_temperature(self.bot.temperature);
                let second = self.generator.generate(follow).await?;
                self.record(&second).await?;
                reply = second.content;
            }
        }

        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(());
        }

        match self
            .state
            .post_as_bot(&self.channel, Message::new(&self.bot.name, reply))
            .await
        {
            Ok(posted) => {
                self.hub
                    .publish(
                        &Topic::channel(&self.channel),
                        &WireEvent::channel_message(&self.channel, &posted),
                    )
                    .await;
                Ok(())
            }
            Err(StateError::NotAMember { .. }) => {
                tracing::debug!("membership revoked mid-flight, dropping reply");
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn record(
        &self,
        completion: &Completion,
    ) -> Result<crate::budget::BudgetStatus, BudgetError> {
        self.budget
            .record_usage(
                &self.bot.provider,
                &self.bot.model,
                completion.usage.prompt_tokens,
                completion.usage.completion_tokens,
            )
            .await
    }

    /// Personality system message plus the bounded recent channel history,
    /// each history line tagged with its channel and author.
    async fn build_prompt(&self) -> Result<Vec<PromptMessage>, StateError> {
        let window = self.bot.history_window.unwrap_or(self.history_window);
        let mut prompt = vec![PromptMessage::system(&self.bot.personality)];
        for msg in self.state.channel_tail(&self.channel, window).await? {
            prompt.push(PromptMessage::user(&format!(
                "[#{}] {}: {}",
                self.channel, msg.author, msg.content
            )));
        }
        Ok(prompt)
    }
}
