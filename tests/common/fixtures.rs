//! Scripted collaborators for driving the engine without real backends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use huddle::broadcast::{Sink, SinkError, WireEvent};
use huddle::generator::{
    Completion, GenerationRequest, Generator, GeneratorError, TokenUsage, ToolCall,
};
use tokio::sync::oneshot;

/// Generator that replays a queue of canned completions and records every
/// request it sees. An empty queue yields an empty completion, which makes
/// the bot stay silent.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Completion>>,
    calls: Mutex<Vec<GenerationRequest>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue(&self, completion: Completion) {
        self.script
            .lock()
            .expect("script poisoned")
            .push_back(completion);
    }

    /// Block the next `generate` call until the returned sender fires.
    pub fn gate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().expect("gate poisoned") = Some(rx);
        tx
    }

    /// Requests observed so far.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Completion, GeneratorError> {
        let gate = self.gate.lock().expect("gate poisoned").take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.calls.lock().expect("calls poisoned").push(request);
        let next = self.script.lock().expect("script poisoned").pop_front();
        Ok(next.unwrap_or_default())
    }
}

/// Generator that always fails, for exercising unit failure containment.
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Completion, GeneratorError> {
        Err(GeneratorError::Backend {
            provider: "openai".to_string(),
            message: "connection reset".to_string(),
        })
    }
}

/// Sink that refuses every delivery, standing in for a dead subscriber.
pub struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    async fn send(&self, _event: &WireEvent) -> Result<(), SinkError> {
        Err(SinkError::Closed("peer went away".to_string()))
    }
}

/// Plain text completion with token usage attached.
pub fn completion(content: &str, prompt_tokens: u64, completion_tokens: u64) -> Completion {
    Completion {
        content: content.to_string(),
        tool_calls: vec![],
        usage: TokenUsage {
            prompt_tokens,
            completion_tokens,
        },
    }
}

/// Completion that asks for tool calls before answering.
pub fn tool_completion(
    content: &str,
    calls: Vec<ToolCall>,
    prompt_tokens: u64,
    completion_tokens: u64,
) -> Completion {
    Completion {
        content: content.to_string(),
        tool_calls: calls,
        usage: TokenUsage {
            prompt_tokens,
            completion_tokens,
        },
    }
}
