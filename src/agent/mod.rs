//! Model-facing building blocks.
//!
//! Provides the chat message model, the pluggable [`LlmProvider`]
//! abstraction backed by OpenAI-compatible APIs, tool definitions and the
//! per-request [`ToolCatalog`], prompt templates and the query
//! reformulator.
//!
//! # Architecture
//!
//! ```text
//! AgentConfig → ProviderSet ── family → LlmProvider (chat / chat_stream)
//!                                           │
//! ToolRegistry ─┐                           ↓
//! Calculator ───┴→ ToolCatalog ──→ ChatRequest.tools → StreamChunk deltas
//! ```

pub mod calculator;
pub mod catalog;
pub mod client;
pub mod config;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reformulate;
pub mod registry;
pub mod stream;
pub mod tool;
pub mod traits;

// Re-export key types
pub use calculator::{CALCULATOR_TOOL, Calculator};
pub use catalog::{Tool, ToolCatalog};
pub use client::{ProviderSet, create_provider};
pub use config::{AgentConfig, RerankerConfig};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use prompt::PromptSet;
pub use provider::{ChunkStream, LlmProvider};
pub use reformulate::QueryReformulator;
pub use registry::{EmptyToolRegistry, ToolRegistry, ToolSession};
pub use stream::{GatheredResponse, StreamChunk, ToolCallChunk};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
pub use traits::{Agent, AgentResponse};
