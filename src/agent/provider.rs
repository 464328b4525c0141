//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. This keeps orchestration decoupled
//! from any particular LLM vendor.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::message::{ChatRequest, ChatResponse};
use super::stream::StreamChunk;
use crate::error::ChatError;

/// Lazily evaluated sequence of model output. Dropping it closes the
/// underlying connection.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ChatError>> + Send>>;

/// Trait for LLM provider backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Whether tool schemas may be bound to requests for this provider.
    ///
    /// Fixed when the provider is constructed; the orchestrator asks once
    /// per request instead of inspecting concrete types.
    fn supports_tool_binding(&self) -> bool {
        false
    }

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UpstreamModel`] on API failures.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError>;

    /// Executes a streaming chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] if the stream cannot be opened; errors after
    /// that arrive as stream items.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ChatError>;
}
