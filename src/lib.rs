//! # Huddle: Real-time Chat & Board Collaboration Engine
//!
//! Huddle is the backend core for a real-time collaboration system: named
//! chat channels and threaded discussion boards, with autonomous bot
//! participants that react to `@mentions` and consume a metered LLM
//! generation resource.
//!
//! ## Core Concepts
//!
//! - **Messages**: Immutable utterances with author and wall-clock timestamp
//! - **Channels & Boards**: The two conversation surfaces, persisted
//!   write-through via a pluggable [`Store`](store::Store)
//! - **BroadcastHub**: Topic-based fan-out of wire events to subscriber sinks
//! - **BotDispatcher**: Mention detection and detached per-bot response units
//! - **TokenBudgetTracker**: Rolling daily/monthly token accounting per
//!   provider and model
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use huddle::bots::BotProfile;
//! use huddle::engine::Engine;
//! use huddle::store::InMemoryStore;
//!
//! # async fn example(
//! #     generator: Arc<dyn huddle::generator::Generator>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::builder()
//!     .with_store(Arc::new(InMemoryStore::new()))
//!     .with_generator(generator)
//!     .with_bot(BotProfile::new("curator", "you organize and summarize information."))
//!     .build()
//!     .await?;
//!
//! // Let the bot post in #general, then mention it.
//! engine.add_bot("general", "curator").await?;
//! engine
//!     .post_channel_message("general", "alice", "@curator what's on the ideas board?")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The call returns as soon as the user message is persisted and broadcast;
//! the bot's reply arrives later through the same channel topic.
//!
//! ## Subscribing to Events
//!
//! ```no_run
//! use std::sync::Arc;
//! use huddle::broadcast::{BroadcastHub, ChannelSink, Topic};
//!
//! let hub = BroadcastHub::new();
//! let (tx, rx) = flume::unbounded();
//! let handle = hub.subscribe(Topic::channel("general"), Arc::new(ChannelSink::new(tx)));
//!
//! // ... forward `rx` to an SSE/WebSocket client ...
//! hub.unsubscribe(&handle);
//! ```
//!
//! ## Module Guide
//!
//! - [`message`] - The message primitive
//! - [`conversations`] - Channels, boards, and the persistent state container
//! - [`broadcast`] - Topic fan-out, sinks, and wire events
//! - [`budget`] - Token budgets, usage windows, and admission control
//! - [`bots`] - Mention scanning, tools, and the dispatcher
//! - [`generator`] - The LLM backend seam
//! - [`store`] - The persistence seam and the bundled backends
//! - [`engine`] - The context object wiring it all together

pub mod bots;
pub mod broadcast;
pub mod budget;
pub mod config;
pub mod conversations;
pub mod engine;
pub mod generator;
pub mod message;
pub mod store;
pub mod telemetry;
