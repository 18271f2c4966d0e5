/*!
The generation seam: everything the engine needs from an LLM backend,
and nothing about how the backend talks to its provider.

A backend must tolerate two sequential [`generate`](Generator::generate)
calls within one bot-response unit: the first may return tool calls, the
second folds the tool results back in.
*/

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Role-tagged prompt line handed to the generation backend.
///
/// # Examples
/// ```
/// use huddle::generator::PromptMessage;
///
/// let msg = PromptMessage::user("What's on the ideas board?");
/// assert!(msg.has_role(PromptMessage::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PromptMessage {
    /// The role of the line (e.g., "user", "assistant", "system", "tool").
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Model response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool result message role.
    pub const TOOL: &'static str = "tool";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    #[must_use]
    pub fn tool(content: &str) -> Self {
        Self::new(Self::TOOL, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// Provider-neutral description of a callable tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// Tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Token accounting the backend reports for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// What a generation call produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// One generation call's inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<PromptMessage>,
    /// Tools the model may call this round; empty disables tool use.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    #[must_use]
    pub fn new(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Errors surfaced by generation backends.
#[derive(Debug, Error, Diagnostic)]
pub enum GeneratorError {
    #[error("generation backend ({provider}) failed: {message}")]
    #[diagnostic(
        code(huddle::generator::backend),
        help("Backend failures are contained to the bot unit that made the call.")
    )]
    Backend { provider: String, message: String },
}

/// The external LLM collaborator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Completion, GeneratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_constants() {
        assert_eq!(PromptMessage::USER, "user");
        assert_eq!(PromptMessage::ASSISTANT, "assistant");
        assert_eq!(PromptMessage::SYSTEM, "system");
        assert_eq!(PromptMessage::TOOL, "tool");
    }

    #[test]
    fn test_convenience_constructors() {
        let msg = PromptMessage::system("be helpful");
        assert!(msg.has_role(PromptMessage::SYSTEM));
        assert_eq!(msg.content, "be helpful");

        let msg = PromptMessage::tool("read_thread: ...");
        assert!(msg.has_role(PromptMessage::TOOL));
    }

    #[test]
    fn test_request_builders() {
        let request = GenerationRequest::new(vec![PromptMessage::user("hi")])
            .with_max_tokens(64)
            .with_temperature(0.2);
        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.temperature, 0.2);
        assert!(request.tools.is_empty());
    }

    #[test]
    fn test_completion_defaults() {
        let completion: Completion = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(completion.content, "hi");
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.usage, TokenUsage::default());
    }
}
