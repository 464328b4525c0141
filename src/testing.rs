//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::catalog::Tool;
use crate::agent::message::{ChatRequest, ChatResponse};
use crate::agent::provider::{ChunkStream, LlmProvider};
use crate::agent::registry::{ToolRegistry, ToolSession};
use crate::agent::stream::{StreamChunk, ToolCallChunk};
use crate::agent::tool::{ToolCall, ToolDefinition};
use crate::error::ChatError;

/// Provider replaying queued responses and recording every request.
#[derive(Default)]
pub struct ScriptedProvider {
    tool_binding: bool,
    replies: Mutex<VecDeque<Result<ChatResponse, ChatError>>>,
    streams: Mutex<VecDeque<Vec<Result<StreamChunk, ChatError>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_binding(mut self) -> Self {
        self.tool_binding = true;
        self
    }

    pub fn reply(self, response: ChatResponse) -> Self {
        self.push_reply(Ok(response));
        self
    }

    pub fn reply_text(self, content: &str) -> Self {
        self.reply(ChatResponse {
            content: content.to_string(),
            ..ChatResponse::default()
        })
    }

    pub fn reply_err(self, error: ChatError) -> Self {
        self.push_reply(Err(error));
        self
    }

    pub fn stream(self, chunks: Vec<StreamChunk>) -> Self {
        self.push_stream(chunks.into_iter().map(Ok).collect());
        self
    }

    pub fn stream_then_fail(self, chunks: Vec<StreamChunk>, error: ChatError) -> Self {
        let mut items: Vec<_> = chunks.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.push_stream(items);
        self
    }

    fn push_reply(&self, reply: Result<ChatResponse, ChatError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    fn push_stream(&self, items: Vec<Result<StreamChunk, ChatError>>) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.push_back(items);
        }
    }

    fn record(&self, request: &ChatRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports_tool_binding(&self) -> bool {
        self.tool_binding
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        self.record(request);
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Ok(ChatResponse::default()))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ChatError> {
        self.record(request);
        let items = self
            .streams
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_default();
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

/// Tool answering with a fixed value after an optional delay, or failing.
pub struct FakeTool {
    definition: ToolDefinition,
    delay: Duration,
    outcome: Result<Value, String>,
    invocations: Mutex<Vec<Value>>,
    completions: AtomicUsize,
}

impl FakeTool {
    pub fn ok(name: &str, value: Value) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.to_string(),
                description: format!("{name} tool"),
                parameters: serde_json::json!({"type": "object"}),
            },
            delay: Duration::ZERO,
            outcome: Ok(value),
            invocations: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            outcome: Err("tool exploded".to_string()),
            ..Self::ok(name, Value::Null)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.lock().map_or(0, |i| i.len())
    }

    /// Invocations that ran to the end of their delay.
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ChatError> {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(arguments);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(|message| ChatError::ToolExecution {
            name: self.definition.name.clone(),
            message,
        })
    }
}

/// Registry serving one [`FakeTool`] through its sessions.
pub struct FakeToolRegistry {
    tool: Arc<FakeTool>,
}

impl FakeToolRegistry {
    pub fn new(tool: Arc<FakeTool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ToolRegistry for FakeToolRegistry {
    async fn connect(&self) -> Result<Arc<dyn ToolSession>, ChatError> {
        Ok(Arc::new(Self {
            tool: Arc::clone(&self.tool),
        }))
    }
}

#[async_trait]
impl ToolSession for FakeToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        Ok(vec![self.tool.definition().clone()])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ChatError> {
        if name != self.tool.definition().name {
            return Err(ChatError::ToolRegistry {
                message: format!("no external tool named '{name}'"),
            });
        }
        self.tool.invoke(arguments).await
    }
}

/// A complete tool call delivered as a single fragment.
pub fn call_fragment(index: u32, id: &str, name: &str, arguments: &str) -> StreamChunk {
    StreamChunk::tool_fragments(vec![ToolCallChunk {
        index,
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        arguments: arguments.to_string(),
    }])
}

/// A completed tool call.
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}
