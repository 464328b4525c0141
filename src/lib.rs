//! # ragline
//!
//! Response orchestration for a conversational assistant. Each chat
//! request takes one of two paths:
//!
//! - **Grounded**: with a knowledge base id, the latest question is
//!   reformulated against the conversation, evidence is retrieved (and
//!   optionally reranked) and the model answers from that context.
//! - **Tool-calling**: without one, the model may call the built-in
//!   calculator or externally registered tools; results are streamed back
//!   as they resolve.
//!
//! Responses are either one JSON body or a stream of newline-delimited
//! JSON events.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ragline::agent::AgentConfig;
//! use ragline::chat::{ChatReply, ConversationTurn, InboundRequest, Orchestrator};
//! use ragline::rag::SqliteStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open(std::path::Path::new("ragline.db"))?);
//! store.init()?;
//! let orchestrator = Orchestrator::from_config(AgentConfig::from_env()?, store)?;
//!
//! let request = InboundRequest {
//!     knowledgebase_id: None,
//!     model: "gpt-4o-mini".to_string(),
//!     family: "openai".to_string(),
//!     messages: vec![ConversationTurn::user("What is 6 / 3?")],
//!     stream: false,
//! };
//! if let ChatReply::Complete(body) = orchestrator.respond(request, CancellationToken::new()).await? {
//!     assert!(!body.message.content.is_empty());
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod cli;
pub mod error;
pub mod rag;
pub mod server;

#[cfg(test)]
mod testing;

pub use chat::{ChatReply, InboundRequest, Orchestrator, OutboundEvent};
pub use error::{ChatError, Result};
