/*!
Tools bots may call between their two generation rounds.

Tools implement the [`Tool`] trait and live in a [`ToolRegistry`] built at
startup. Dispatch is by name; an unknown name is a typed error. Every tool
failure, typed or otherwise, is folded into the result string handed back
to the model so a bad call never aborts the unit.

Posting tools never trust a model-supplied author: the acting bot comes
from the [`ToolContext`], and membership is re-validated at call time.
*/

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;

use crate::broadcast::{BroadcastHub, Topic, WireEvent};
use crate::conversations::{ConversationState, StateError};
use crate::generator::{ToolCall, ToolSpec};
use crate::message::Message;

/// Errors surfaced by tool dispatch and execution.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    #[diagnostic(
        code(huddle::bots::unknown_tool),
        help("Only tools registered at startup can be invoked.")
    )]
    UnknownTool { name: String },

    #[error("invalid arguments for {tool}: {message}")]
    #[diagnostic(code(huddle::bots::bad_arguments))]
    BadArguments {
        tool: &'static str,
        message: String,
    },

    #[error("bot {bot} is not a member of #{channel}")]
    #[diagnostic(code(huddle::bots::membership))]
    Membership { bot: String, channel: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),
}

/// Ambient facts a tool invocation may rely on: who is calling, from which
/// channel, and the shared surfaces it may touch.
#[derive(Clone)]
pub struct ToolContext {
    pub bot_name: String,
    pub channel: String,
    pub state: Arc<ConversationState>,
    pub hub: Arc<BroadcastHub>,
}

/// A callable capability exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

/// Name-keyed tool lookup built once at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: FxHashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in channel and board tools.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_tool(ReadChannelMessages)
            .with_tool(PostChannelMessage)
            .with_tool(ListBoards)
            .with_tool(ReadBoardThreads)
            .with_tool(ReadThread)
            .with_tool(PostThreadReply)
            .with_tool(CreateThread)
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Tool>, ToolError> {
        self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })
    }

    /// Provider-neutral specs for every registered tool, sorted by name for
    /// deterministic prompts.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Resolve one tool call, folding every failure into the returned
    /// string.
    pub async fn dispatch(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let tool = match self.get(&call.name) {
            Ok(tool) => Arc::clone(tool),
            Err(error) => return format!("error: {error}"),
        };
        match tool.invoke(ctx, call.arguments.clone()).await {
            Ok(output) => output,
            Err(error) => {
                tracing::debug!(tool = %call.name, %error, "tool call failed");
                format!("error: {error}")
            }
        }
    }
}

fn str_arg(args: &Value, key: &str, tool: &'static str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::BadArguments {
            tool,
            message: format!("missing string field `{key}`"),
        })
}

fn limit_arg(args: &Value, default: usize) -> usize {
    args.get("limit")
        .and_then(Value::as_u64)
        .map_or(default, |v| v as usize)
}

/// `read_channel_messages`: recent messages from a chat channel.
struct ReadChannelMessages;

#[async_trait]
impl Tool for ReadChannelMessages {
    fn name(&self) -> &'static str {
        "read_channel_messages"
    }

    fn description(&self) -> &'static str {
        "Read recent messages from a chat channel"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_name": {
                    "type": "string",
                    "description": "Name of the channel to read"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of messages to return (default: 10)"
                }
            },
            "required": ["channel_name"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let channel_name = str_arg(&args, "channel_name", self.name())?;
        let limit = limit_arg(&args, 10);
        let messages = ctx.state.channel_tail(&channel_name, limit).await?;

        let mut result = format!("Recent messages in #{channel_name}:\n");
        for msg in &messages {
            result.push_str(&format!("[{}]: {}\n", msg.author, msg.content));
        }
        Ok(result)
    }
}

/// `post_channel_message`: membership-validated post into any channel.
struct PostChannelMessage;

#[async_trait]
impl Tool for PostChannelMessage {
    fn name(&self) -> &'static str {
        "post_channel_message"
    }

    fn description(&self) -> &'static str {
        "Post a message to a chat channel"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_name": {
                    "type": "string",
                    "description": "Name of the channel to post to"
                },
                "content": {
                    "type": "string",
                    "description": "Message content"
                }
            },
            "required": ["channel_name", "content"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let channel_name = str_arg(&args, "channel_name", self.name())?;
        let content = str_arg(&args, "content", self.name())?;

        let message = Message::new(&ctx.bot_name, &content);
        let posted = match ctx.state.post_as_bot(&channel_name, message).await {
            Ok(posted) => posted,
            Err(StateError::NotAMember { bot, channel }) => {
                return Err(ToolError::Membership { bot, channel });
            }
            Err(other) => return Err(other.into()),
        };
        ctx.hub
            .publish(
                &Topic::channel(&channel_name),
                &WireEvent::channel_message(&channel_name, &posted),
            )
            .await;
        Ok(format!("message posted to #{channel_name}"))
    }
}

/// `list_boards`: names of every board in the store.
struct ListBoards;

#[async_trait]
impl Tool for ListBoards {
    fn name(&self) -> &'static str {
        "list_boards"
    }

    fn description(&self) -> &'static str {
        "List all available message boards"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, _args: Value) -> Result<String, ToolError> {
        let names = ctx.state.board_names().await?;
        if names.is_empty() {
            Ok("No message boards found.".to_string())
        } else {
            Ok(format!("Available message boards: {}", names.join(", ")))
        }
    }
}

/// `read_board_threads`: thread listing in board display order.
struct ReadBoardThreads;

#[async_trait]
impl Tool for ReadBoardThreads {
    fn name(&self) -> &'static str {
        "read_board_threads"
    }

    fn description(&self) -> &'static str {
        "Read thread titles from a message board"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_name": {
                    "type": "string",
                    "description": "Name of the board to read"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of threads to return (default: 5)"
                }
            },
            "required": ["board_name"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let board_name = str_arg(&args, "board_name", self.name())?;
        let limit = limit_arg(&args, 5);
        let board = ctx.state.get_or_create_board(&board_name).await?;

        if board.threads.is_empty() {
            return Ok(format!("No threads found on board '{board_name}'."));
        }

        let mut result = format!("Threads on board '{board_name}':\n");
        for thread in board.threads.iter().take(if limit == 0 {
            board.threads.len()
        } else {
            limit
        }) {
            let pinned = if thread.pinned { " [PINNED]" } else { "" };
            let tags = if thread.tags.is_empty() {
                String::new()
            } else {
                let mut sorted: Vec<&str> = thread.tags.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                format!(" [tags: {}]", sorted.join(", "))
            };
            result.push_str(&format!(
                "- {} (id: {}){pinned}{tags}\n",
                thread.title, thread.id
            ));
        }
        Ok(result)
    }
}

/// `read_thread`: full message log of one thread.
struct ReadThread;

#[async_trait]
impl Tool for ReadThread {
    fn name(&self) -> &'static str {
        "read_thread"
    }

    fn description(&self) -> &'static str {
        "Read messages from a specific thread"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_name": {
                    "type": "string",
                    "description": "Name of the board"
                },
                "thread_id": {
                    "type": "string",
                    "description": "Id of the thread"
                }
            },
            "required": ["board_name", "thread_id"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let board_name = str_arg(&args, "board_name", self.name())?;
        let thread_id = str_arg(&args, "thread_id", self.name())?;
        let board = ctx.state.get_or_create_board(&board_name).await?;

        let Some(thread) = board.thread(&thread_id) else {
            return Ok(format!(
                "Thread {thread_id} not found on board '{board_name}'."
            ));
        };

        let mut result = format!("Thread: {}\n", thread.title);
        if !thread.tags.is_empty() {
            let mut sorted: Vec<&str> = thread.tags.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            result.push_str(&format!("Tags: {}\n", sorted.join(", ")));
        }
        if thread.pinned {
            result.push_str("Status: PINNED\n");
        }
        result.push_str("\nMessages:\n");
        for msg in &thread.messages {
            result.push_str(&format!("[{}]: {}\n", msg.author, msg.content));
        }
        Ok(result)
    }
}

/// `post_thread_reply`: append a reply to an existing thread.
struct PostThreadReply;

#[async_trait]
impl Tool for PostThreadReply {
    fn name(&self) -> &'static str {
        "post_thread_reply"
    }

    fn description(&self) -> &'static str {
        "Post a reply to a thread"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_name": {
                    "type": "string",
                    "description": "Name of the board"
                },
                "thread_id": {
                    "type": "string",
                    "description": "Id of the thread"
                },
                "content": {
                    "type": "string",
                    "description": "Message content"
                }
            },
            "required": ["board_name", "thread_id", "content"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let board_name = str_arg(&args, "board_name", self.name())?;
        let thread_id = str_arg(&args, "thread_id", self.name())?;
        let content = str_arg(&args, "content", self.name())?;

        let message = Message::new(&ctx.bot_name, &content);
        match ctx
            .state
            .append_thread_message(&board_name, &thread_id, message.clone())
            .await
        {
            Ok(()) => {}
            Err(StateError::UnknownThread { board, thread_id }) => {
                return Ok(format!("Thread {thread_id} not found on board '{board}'."));
            }
            Err(other) => return Err(other.into()),
        }
        ctx.hub
            .publish(
                &Topic::board(&board_name),
                &WireEvent::thread_reply(&board_name, &thread_id, &message),
            )
            .await;
        Ok(format!("Reply posted to thread on board '{board_name}'."))
    }
}

/// `create_thread`: open a new thread, optionally tagged.
struct CreateThread;

#[async_trait]
impl Tool for CreateThread {
    fn name(&self) -> &'static str {
        "create_thread"
    }

    fn description(&self) -> &'static str {
        "Create a new thread on a message board"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "board_name": {
                    "type": "string",
                    "description": "Name of the board"
                },
                "title": {
                    "type": "string",
                    "description": "Thread title"
                },
                "content": {
                    "type": "string",
                    "description": "First message content"
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional list of tags"
                }
            },
            "required": ["board_name", "title", "content"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let board_name = str_arg(&args, "board_name", self.name())?;
        let title = str_arg(&args, "title", self.name())?;
        let content = str_arg(&args, "content", self.name())?;
        let tags: Vec<String> = args
            .get("tags")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let first_message = Message::new(&ctx.bot_name, &content);
        let mut thread = ctx
            .state
            .create_thread(&board_name, &title, first_message)
            .await?;
        if !tags.is_empty() {
            thread = ctx.state.add_tags(&board_name, &thread.id, tags).await?;
        }
        ctx.hub
            .publish(
                &Topic::board(&board_name),
                &WireEvent::new_thread(&board_name, &thread),
            )
            .await;
        Ok(format!(
            "Created new thread '{title}' on board '{board_name}'."
        ))
    }
}
