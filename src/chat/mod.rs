//! Response orchestration.
//!
//! ```text
//! InboundRequest → normalize ─┬─ knowledge base → RAG branch ─────────┐
//!                             └─ no knowledge base → ToolLoop ────────┤
//!                                                                     ↓
//!                                    CompletionBody | NDJSON OutboundEvents
//! ```

pub mod dispatch;
pub mod event;
pub mod orchestrator;
pub mod request;

pub use dispatch::ToolLoop;
pub use event::{CompletionBody, EventSink, OutboundEvent};
pub use orchestrator::{ChatReply, Collaborators, EventStream, Orchestrator};
pub use request::{ConversationTurn, InboundRequest, TurnRole, normalize};
