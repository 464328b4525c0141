//! Tool-calling dispatch loop.
//!
//! Drives model → tool calls → tool results for one request. The
//! synchronous shape is single-turn: tools run but their results are not
//! fed back. The streaming shape forwards text as it arrives, resolves the
//! completed tool calls concurrently once the model stream ends, and emits
//! the results in call order. Streaming runs at most `max_rounds` rounds; with
//! one round, tool results are terminal events.

use std::pin::pin;

use futures_util::{Stream, StreamExt, stream};
use tracing::{debug, warn};

use super::event::{EventSink, OutboundEvent};
use crate::agent::catalog::ToolCatalog;
use crate::agent::message::{ChatRequest, ChatResponse, assistant_tool_calls_message, tool_message};
use crate::agent::provider::LlmProvider;
use crate::agent::stream::GatheredResponse;
use crate::agent::tool::{ToolCall, ToolResult};
use crate::error::ChatError;

/// Text fed back to the model for a call that produced no result.
const UNRESOLVED_TOOL_RESULT: &str = "tool unavailable or failed";

/// Bounded model ↔ tool loop over one provider and catalog.
pub struct ToolLoop<'a> {
    provider: &'a dyn LlmProvider,
    catalog: &'a ToolCatalog,
    max_rounds: usize,
    concurrency: usize,
}

impl<'a> ToolLoop<'a> {
    /// Creates a single-round loop running up to 4 tools at once.
    #[must_use]
    pub fn new(provider: &'a dyn LlmProvider, catalog: &'a ToolCatalog) -> Self {
        Self {
            provider,
            catalog,
            max_rounds: 1,
            concurrency: 4,
        }
    }

    /// Sets the streaming round bound (minimum 1).
    #[must_use]
    pub fn max_rounds(mut self, n: usize) -> Self {
        self.max_rounds = n.max(1);
        self
    }

    /// Sets how many tool invocations may run concurrently (minimum 1).
    #[must_use]
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// One model call; completed tool calls are invoked and their results
    /// discarded. Returns the model's initial response unchanged.
    ///
    /// # Errors
    ///
    /// Propagates provider failures. Tool failures are logged only.
    pub async fn run_single_turn(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let response = self.provider.chat(request).await?;
        if response.tool_calls.is_empty() {
            return Ok(response);
        }

        debug!(
            tool_count = response.tool_calls.len(),
            "invoking tool calls from single-turn response"
        );
        let resolved: Vec<_> = self
            .resolve_all(response.tool_calls.clone())
            .collect()
            .await;
        let succeeded = resolved.iter().filter(|(_, r)| r.is_some()).count();
        debug!(succeeded, "single-turn tool results discarded");

        Ok(response)
    }

    /// Streams the response into `sink`.
    ///
    /// # Errors
    ///
    /// Propagates provider and stream failures, and
    /// [`ChatError::Cancelled`] once the sink's reader is gone.
    pub async fn run_streaming(
        &self,
        mut request: ChatRequest,
        sink: &EventSink,
    ) -> Result<(), ChatError> {
        request.stream = true;

        for round in 1..=self.max_rounds {
            let gathered = self.stream_round(&request, sink).await?;
            let calls = gathered.tool_calls();
            if calls.is_empty() {
                debug!(round, "model finished without tool calls");
                return Ok(());
            }

            debug!(round, tool_count = calls.len(), "resolving tool calls");
            let mut followups = Vec::with_capacity(calls.len());
            let mut pending = pin!(self.resolve_all(calls.clone()));
            while let Some((call, resolved)) = pending.next().await {
                match resolved {
                    Some(result) => {
                        sink.emit(OutboundEvent::tool_result(&result)).await?;
                        followups.push(tool_message(&result.tool_call_id, &result.content_text()));
                    }
                    None => followups.push(tool_message(&call.id, UNRESOLVED_TOOL_RESULT)),
                }
            }

            if round == self.max_rounds {
                debug!(round, "round limit reached, tool results are terminal");
                return Ok(());
            }

            request
                .messages
                .push(assistant_tool_calls_message(gathered.content(), calls));
            request.messages.extend(followups);
        }

        Ok(())
    }

    /// Consumes one model stream, forwarding text deltas immediately.
    async fn stream_round(
        &self,
        request: &ChatRequest,
        sink: &EventSink,
    ) -> Result<GatheredResponse, ChatError> {
        let mut chunks = self.provider.chat_stream(request).await?;
        let mut gathered = GatheredResponse::default();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if !chunk.content.is_empty() {
                sink.emit(OutboundEvent::TextDelta(chunk.content.clone()))
                    .await?;
            }
            gathered.push(chunk);
        }

        Ok(gathered)
    }

    /// Resolves calls concurrently, yielding in call order.
    fn resolve_all(
        &self,
        calls: Vec<ToolCall>,
    ) -> impl Stream<Item = (ToolCall, Option<ToolResult>)> + Send + '_ {
        let catalog = self.catalog;
        stream::iter(calls)
            .map(move |call| resolve(catalog, call))
            .buffered(self.concurrency)
    }
}

/// Runs one call. Unknown tools and failures are logged and yield `None`.
async fn resolve(catalog: &ToolCatalog, call: ToolCall) -> (ToolCall, Option<ToolResult>) {
    let resolved = match catalog.execute(&call).await {
        Ok(Some(result)) => {
            debug!(tool = %call.name, call_id = %call.id, "tool call resolved");
            Some(result)
        }
        Ok(None) => {
            warn!(tool = %call.name, call_id = %call.id, "model called unknown tool, skipping");
            None
        }
        Err(e) => {
            warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed, skipping");
            None
        }
    };
    (call, resolved)
}
