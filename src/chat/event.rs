//! Outbound wire types and the event sink.
//!
//! Streaming responses are newline-delimited JSON, one [`OutboundEvent`]
//! per line; synchronous responses are a single [`CompletionBody`].

use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::tool::ToolResult;
use crate::error::ChatError;
use crate::rag::EvidenceDocument;

/// One unit of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Text produced by the model, forwarded as it arrives.
    TextDelta(String),
    /// Evidence used to ground the answer; sent after the text.
    RelevantDocuments(Vec<EvidenceDocument>),
    /// Result of a tool the model called.
    ToolResult {
        /// Id of the originating tool call.
        tool_use_id: String,
        /// Raw tool output.
        content: Value,
    },
    /// The response failed after streaming began.
    Error(String),
}

impl OutboundEvent {
    /// Builds a tool-result event.
    #[must_use]
    pub fn tool_result(result: &ToolResult) -> Self {
        Self::ToolResult {
            tool_use_id: result.tool_call_id.clone(),
            content: result.content.clone(),
        }
    }

    /// JSON shape of the event.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::TextDelta(content) => json!({
                "message": {"role": "assistant", "content": content}
            }),
            Self::RelevantDocuments(documents) => json!({
                "type": "relevant_documents",
                "relevant_documents": documents,
            }),
            Self::ToolResult {
                tool_use_id,
                content,
            } => json!({
                "message": {
                    "role": "user",
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                }
            }),
            Self::Error(message) => json!({"type": "error", "error": message}),
        }
    }

    /// The event as one NDJSON line, newline included.
    #[must_use]
    pub fn to_ndjson(&self) -> String {
        let mut line = self.to_json().to_string();
        line.push('\n');
        line
    }
}

impl Serialize for OutboundEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// The assistant message inside a [`CompletionBody`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionMessage {
    /// Always `"assistant"`.
    pub role: &'static str,
    /// Answer text.
    pub content: String,
    /// Evidence used, present on the RAG branch only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant_docs: Option<Vec<EvidenceDocument>>,
}

/// Body of a non-streaming response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionBody {
    /// The answer.
    pub message: CompletionMessage,
}

impl CompletionBody {
    /// Wraps an answer.
    #[must_use]
    pub fn new(content: String, relevant_docs: Option<Vec<EvidenceDocument>>) -> Self {
        Self {
            message: CompletionMessage {
                role: "assistant",
                content,
                relevant_docs,
            },
        }
    }
}

/// Write half of a streamed response.
///
/// Sends wait for channel capacity, so a slow reader slows the producer.
/// Once the reader is dropped or the token is cancelled every send fails
/// with [`ChatError::Cancelled`].
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<OutboundEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Wraps a channel sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<OutboundEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Sends one event.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Cancelled`] if the reader is gone.
    pub async fn emit(&self, event: OutboundEvent) -> Result<(), ChatError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ChatError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| ChatError::Cancelled),
        }
    }

    /// Resolves when the reader goes away or the token is cancelled.
    pub async fn closed(&self) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = self.tx.closed() => {}
        }
    }
}
