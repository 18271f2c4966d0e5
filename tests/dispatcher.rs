//! End-to-end bot dispatch: mentions, membership, budget gating, tools.

mod common;

use std::sync::Arc;

use common::fixtures::{completion, tool_completion, FailingGenerator, ScriptedGenerator};
use common::{settle, wait_until, UNIT_DEADLINE};
use huddle::bots::BotProfile;
use huddle::broadcast::{MemorySink, Topic, WireEvent};
use huddle::budget::TokenBudget;
use huddle::engine::Engine;
use huddle::generator::{Generator, PromptMessage, ToolCall};
use huddle::store::InMemoryStore;
use serde_json::json;

async fn engine_with(generator: Arc<dyn Generator>, bots: Vec<BotProfile>) -> Engine {
    Engine::builder()
        .with_store(Arc::new(InMemoryStore::new()))
        .with_generator(generator)
        .with_bots(bots)
        .build()
        .await
        .expect("engine builds")
}

fn curator() -> BotProfile {
    BotProfile::new("curator", "you organize and summarize information.")
}

/// Wait until the channel holds `count` messages.
async fn wait_for_messages(engine: &Engine, channel: &str, count: usize) -> bool {
    let deadline = tokio::time::Instant::now() + UNIT_DEADLINE;
    loop {
        let current = engine.channel(channel).await.unwrap().messages.len();
        if current >= count {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn mentioned_member_bot_replies_end_to_end() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("happy to help!", 12, 7));
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    let sink = MemorySink::new();
    engine.subscribe(Topic::channel("general"), Arc::new(sink.clone()));

    engine
        .post_channel_message("general", "alice", "@curator can you help?")
        .await
        .unwrap();

    assert!(wait_until(UNIT_DEADLINE, || sink.snapshot().len() >= 2).await);

    // The user message was broadcast before the bot reply.
    let events = sink.snapshot();
    match &events[0] {
        WireEvent::Message { message, .. } => assert_eq!(message.author, "alice"),
        other => panic!("unexpected event: {other:?}"),
    }
    match &events[1] {
        WireEvent::Message { message, .. } => {
            assert_eq!(message.author, "curator");
            assert_eq!(message.content, "happy to help!");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Both messages persisted, usage recorded.
    let channel = engine.channel("general").await.unwrap();
    assert_eq!(channel.messages.len(), 2);
    let report = engine.usage_report().await;
    assert_eq!(report["lifetime"]["openai"]["gpt-4o"]["total_tokens"], 19);

    // The prompt carried the personality and the triggering message.
    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].messages[0].has_role(PromptMessage::SYSTEM));
    assert!(
        calls[0]
            .messages
            .iter()
            .any(|m| m.content.contains("@curator can you help?"))
    );
}

#[tokio::test]
async fn unmentioned_bot_stays_silent() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("should never appear", 1, 1));
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    engine
        .post_channel_message("general", "alice", "nothing to see here")
        .await
        .unwrap();
    settle().await;

    assert!(generator.calls().is_empty());
    assert_eq!(engine.channel("general").await.unwrap().messages.len(), 1);
}

#[tokio::test]
async fn non_member_bot_never_posts() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("should never appear", 1, 1));
    let engine = engine_with(generator.clone(), vec![curator()]).await;

    engine
        .post_channel_message("general", "alice", "@curator hello?")
        .await
        .unwrap();
    settle().await;

    // Not a member and no join offer: the unit is never spawned.
    assert!(generator.calls().is_empty());
    assert_eq!(engine.channel("general").await.unwrap().messages.len(), 1);
}

#[tokio::test]
async fn join_mention_invites_non_member_bot() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("glad to be here", 5, 5));
    let engine = engine_with(generator.clone(), vec![curator()]).await;

    engine
        .post_channel_message("general", "alice", "@curator please join us")
        .await
        .unwrap();

    assert!(wait_for_messages(&engine, "general", 2).await);
    let channel = engine.channel("general").await.unwrap();
    assert!(channel.has_bot("curator"));
    assert_eq!(channel.messages[1].author, "curator");
}

#[tokio::test]
async fn all_mention_triggers_every_member_bot() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("reporting in", 1, 1));
    generator.enqueue(completion("reporting in", 1, 1));
    let bots = vec![
        curator(),
        BotProfile::new("normie", "haha thats crazy. catch the game last night?"),
        BotProfile::new("ghost", "not in this channel"),
    ];
    let engine = engine_with(generator.clone(), bots).await;
    engine.add_bot("general", "curator").await.unwrap();
    engine.add_bot("general", "normie").await.unwrap();

    engine
        .post_channel_message("general", "alice", "@all standup time")
        .await
        .unwrap();

    assert!(wait_for_messages(&engine, "general", 3).await);
    settle().await;

    let channel = engine.channel("general").await.unwrap();
    let mut bot_authors: Vec<&str> = channel.messages[1..]
        .iter()
        .map(|m| m.author.as_str())
        .collect();
    bot_authors.sort_unstable();
    assert_eq!(bot_authors, ["curator", "normie"]);
}

#[tokio::test]
async fn budget_refusal_is_silent() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("should never appear", 1, 1));
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();
    engine
        .set_provider_budget("openai", TokenBudget::daily(10))
        .await
        .unwrap();
    engine
        .budget()
        .record_usage("openai", "gpt-4o", 10, 0)
        .await
        .unwrap();

    engine
        .post_channel_message("general", "alice", "@curator hello?")
        .await
        .unwrap();
    settle().await;

    // No generator call, no reply, no synthetic apology message.
    assert!(generator.calls().is_empty());
    assert_eq!(engine.channel("general").await.unwrap().messages.len(), 1);
}

#[tokio::test]
async fn generator_failure_is_contained() {
    let engine = engine_with(Arc::new(FailingGenerator), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    engine
        .post_channel_message("general", "alice", "@curator hello?")
        .await
        .unwrap();
    settle().await;

    assert_eq!(engine.channel("general").await.unwrap().messages.len(), 1);

    // The engine itself is unaffected by the failed unit.
    engine
        .post_channel_message("general", "alice", "still works")
        .await
        .unwrap();
    assert_eq!(engine.channel("general").await.unwrap().messages.len(), 2);
}

#[tokio::test]
async fn empty_completion_posts_nothing() {
    let generator = ScriptedGenerator::new();
    // Queue left empty: generate yields an empty completion.
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    engine
        .post_channel_message("general", "alice", "@curator hello?")
        .await
        .unwrap();
    settle().await;

    assert_eq!(generator.calls().len(), 1);
    assert_eq!(engine.channel("general").await.unwrap().messages.len(), 1);
}

#[tokio::test]
async fn tool_round_trip_feeds_results_into_second_call() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(tool_completion(
        "",
        vec![ToolCall {
            name: "read_channel_messages".to_string(),
            arguments: json!({"channel_name": "general", "limit": 5}),
        }],
        10,
        5,
    ));
    generator.enqueue(completion("all caught up", 7, 3));
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    engine
        .post_channel_message("general", "alice", "@curator what did I miss?")
        .await
        .unwrap();

    assert!(wait_for_messages(&engine, "general", 2).await);

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    // First round offered tools; the follow-up ran without them.
    assert!(!calls[0].tools.is_empty());
    assert!(calls[1].tools.is_empty());
    // The tool result was folded into the follow-up prompt.
    let tool_lines: Vec<&PromptMessage> = calls[1]
        .messages
        .iter()
        .filter(|m| m.has_role(PromptMessage::TOOL))
        .collect();
    assert_eq!(tool_lines.len(), 1);
    assert!(tool_lines[0].content.contains("Recent messages in #general"));
    assert!(tool_lines[0].content.contains("what did I miss?"));

    let channel = engine.channel("general").await.unwrap();
    assert_eq!(channel.messages[1].content, "all caught up");

    // Both calls were metered.
    let report = engine.usage_report().await;
    assert_eq!(report["lifetime"]["openai"]["gpt-4o"]["total_tokens"], 25);
}

#[tokio::test]
async fn posting_tool_revalidates_membership() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(tool_completion(
        "",
        vec![ToolCall {
            name: "post_channel_message".to_string(),
            arguments: json!({"channel_name": "private", "content": "sneaking in"}),
        }],
        1,
        1,
    ));
    generator.enqueue(completion("couldn't post there", 1, 1));
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    engine
        .post_channel_message("general", "alice", "@curator try posting to private")
        .await
        .unwrap();

    assert!(wait_for_messages(&engine, "general", 2).await);

    // The cross-channel post was refused and surfaced to the model as an
    // error string, not an exception.
    assert!(engine.channel("private").await.unwrap().messages.is_empty());
    let calls = generator.calls();
    let tool_line = calls[1]
        .messages
        .iter()
        .find(|m| m.has_role(PromptMessage::TOOL))
        .expect("tool result line");
    assert!(tool_line.content.contains("error:"));
    assert!(tool_line.content.contains("not a member"));
}

#[tokio::test]
async fn membership_revoked_mid_flight_drops_the_reply() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(completion("too late", 1, 1));
    let release = generator.gate();
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();

    engine
        .post_channel_message("general", "alice", "@curator hello?")
        .await
        .unwrap();

    // Revoke while the unit is parked inside its generator call.
    engine.remove_bot("general", "curator").await.unwrap();
    let _ = release.send(());
    settle().await;

    let channel = engine.channel("general").await.unwrap();
    assert_eq!(channel.messages.len(), 1);
    assert_eq!(channel.messages[0].author, "alice");
}

#[tokio::test]
async fn budget_exhaustion_after_first_call_suppresses_tool_round() {
    let generator = ScriptedGenerator::new();
    generator.enqueue(tool_completion(
        "partial answer",
        vec![ToolCall {
            name: "list_boards".to_string(),
            arguments: json!({}),
        }],
        10,
        5,
    ));
    generator.enqueue(completion("should never appear", 1, 1));
    let engine = engine_with(generator.clone(), vec![curator()]).await;
    engine.add_bot("general", "curator").await.unwrap();
    engine
        .set_provider_budget("openai", TokenBudget::daily(10))
        .await
        .unwrap();

    engine
        .post_channel_message("general", "alice", "@curator what boards exist?")
        .await
        .unwrap();

    assert!(wait_for_messages(&engine, "general", 2).await);
    settle().await;

    // The first call crossed the limit, so the tool round and follow-up
    // never ran; the already-paid-for first content still posts.
    assert_eq!(generator.calls().len(), 1);
    let channel = engine.channel("general").await.unwrap();
    assert_eq!(channel.messages[1].content, "partial answer");
}
