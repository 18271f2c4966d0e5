//! End-to-end walkthrough with a scripted generator standing in for a real
//! LLM backend: build an engine, wire a subscriber, mention a bot, watch the
//! reply arrive over the wire.
//!
//! Run with: `cargo run --example huddle_demo`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huddle::bots::BotProfile;
use huddle::broadcast::{ChannelSink, Topic};
use huddle::budget::TokenBudget;
use huddle::engine::Engine;
use huddle::generator::{Completion, GenerationRequest, Generator, GeneratorError, TokenUsage};
use huddle::store::InMemoryStore;

/// Pops canned completions in order; real deployments implement
/// [`Generator`] against an actual provider client.
struct ScriptedGenerator {
    script: Mutex<Vec<Completion>>,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Completion, GeneratorError> {
        let mut script = self.script.lock().expect("script poisoned");
        if script.is_empty() {
            return Ok(Completion::default());
        }
        Ok(script.remove(0))
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    huddle::telemetry::init();

    let generator = Arc::new(ScriptedGenerator {
        script: Mutex::new(vec![Completion {
            content: "filed under #planning, will keep the board tidy.".to_string(),
            tool_calls: vec![],
            usage: TokenUsage {
                prompt_tokens: 42,
                completion_tokens: 11,
            },
        }]),
    });

    let engine = Engine::builder()
        .with_store(Arc::new(InMemoryStore::new()))
        .with_generator(generator)
        .with_bot(BotProfile::new(
            "curator",
            "you are curator, a bot who organizes and summarizes information.",
        ))
        .build()
        .await?;

    engine
        .set_provider_budget("openai", TokenBudget::daily(10_000))
        .await?;
    engine.add_bot("general", "curator").await?;

    let (tx, rx) = flume::unbounded();
    engine.subscribe(Topic::channel("general"), Arc::new(ChannelSink::new(tx)));

    engine
        .post_channel_message("general", "alice", "@curator please keep track of our plans")
        .await?;

    // Two events: alice's message immediately, the bot reply once its unit
    // finishes.
    for _ in 0..2 {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv_async()).await {
            Ok(Ok(event)) => println!("{}", serde_json::to_string_pretty(&event).expect("json")),
            _ => break,
        }
    }

    println!("\nusage report:\n{}", engine.usage_report().await);
    Ok(())
}
