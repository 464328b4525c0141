//! Response orchestrator.
//!
//! Picks the branch for an inbound request and drives it:
//!
//! ```text
//! knowledgebaseId present → reformulate → retrieve → rerank? → prompt → model
//! knowledgebaseId absent  → tool catalog → model with tools → dispatch loop
//! ```
//!
//! Either branch answers with one [`CompletionBody`] or, when the caller
//! asked to stream, an NDJSON event stream fed by a spawned task.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatch::ToolLoop;
use super::event::{CompletionBody, EventSink, OutboundEvent};
use super::request::{InboundRequest, normalize, split_latest};
use crate::agent::catalog::ToolCatalog;
use crate::agent::client::ProviderSet;
use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, user_message};
use crate::agent::prompt::{PromptSet, serialize_history};
use crate::agent::provider::LlmProvider;
use crate::agent::reformulate::QueryReformulator;
use crate::agent::registry::{EmptyToolRegistry, ToolRegistry};
use crate::error::ChatError;
use crate::rag::{
    Embedder, EmbedderFactory, EvidenceDocument, HttpReranker, KnowledgeStore,
    OpenAiEmbedderFactory, Reranker, Retriever, SqliteStore, SqliteVectorRetriever, join_context,
};

/// Stream of outbound events for one request.
pub type EventStream = ReceiverStream<OutboundEvent>;

/// How a request is answered.
#[derive(Debug)]
pub enum ChatReply {
    /// A single JSON body.
    Complete(CompletionBody),
    /// NDJSON events, produced while the caller reads.
    Stream(EventStream),
}

/// External collaborators the orchestrator drives.
pub struct Collaborators {
    /// Chat models by family.
    pub providers: ProviderSet,
    /// Knowledge-base lookup.
    pub knowledge: Arc<dyn KnowledgeStore>,
    /// Embedding clients per provider row.
    pub embedders: Arc<dyn EmbedderFactory>,
    /// Evidence retrieval.
    pub retriever: Arc<dyn Retriever>,
    /// Optional second-pass reranker.
    pub reranker: Option<Arc<dyn Reranker>>,
    /// Source of external tools.
    pub tools: Arc<dyn ToolRegistry>,
}

/// Answers chat requests over the RAG or tool-calling branch.
pub struct Orchestrator {
    parts: Collaborators,
    config: AgentConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults.
    #[must_use]
    pub fn new(config: AgentConfig, parts: Collaborators) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            parts,
            config,
            prompts,
        }
    }

    /// Wires the bundled collaborators around a knowledge store: `OpenAI`
    /// families, `OpenAI` embeddings, cosine retrieval over `store`, the
    /// HTTP reranker when configured and no external tools.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] if a collaborator cannot be built.
    pub fn from_config(config: AgentConfig, store: Arc<SqliteStore>) -> Result<Self, ChatError> {
        let reranker = HttpReranker::from_config(&config.reranker, config.timeout)?
            .map(|r| Arc::new(r) as Arc<dyn Reranker>);
        let parts = Collaborators {
            providers: ProviderSet::from_config(&config)?,
            knowledge: Arc::clone(&store) as Arc<dyn KnowledgeStore>,
            embedders: Arc::new(OpenAiEmbedderFactory::new(config.api_key.clone())),
            retriever: Arc::new(SqliteVectorRetriever::new(store, config.retrieval_top_k)),
            reranker,
            tools: Arc::new(EmptyToolRegistry),
        };
        Ok(Self::new(config, parts))
    }

    /// Replaces the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answers one request.
    ///
    /// Streaming work runs on a spawned task; it stops when the returned
    /// stream is dropped or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] for an unknown knowledge base before
    /// any model or retrieval call, [`ChatError::InvalidRequest`] for a
    /// malformed conversation, and collaborator failures that occur before
    /// the response starts.
    pub async fn respond(
        &self,
        request: InboundRequest,
        cancel: CancellationToken,
    ) -> Result<ChatReply, ChatError> {
        let messages = normalize(&request.messages)?;
        split_latest(&messages)?;
        let provider = self.parts.providers.get(&request.family)?;

        debug!(
            family = %request.family,
            model = %request.model,
            knowledgebase_id = ?request.knowledgebase_id,
            stream = request.stream,
            turns = messages.len(),
            "chat request"
        );

        match request.knowledgebase_id {
            Some(id) => {
                self.respond_grounded(provider, &request, &messages, id, cancel)
                    .await
            }
            None => {
                self.respond_with_tools(provider, &request, messages, cancel)
                    .await
            }
        }
    }

    async fn respond_grounded(
        &self,
        provider: Arc<dyn LlmProvider>,
        request: &InboundRequest,
        messages: &[ChatMessage],
        knowledgebase_id: i64,
        cancel: CancellationToken,
    ) -> Result<ChatReply, ChatError> {
        let start = Instant::now();

        let kb = self
            .parts
            .knowledge
            .knowledge_base(knowledgebase_id)
            .await?
            .ok_or_else(|| ChatError::NotFound {
                resource: "knowledge base",
                id: knowledgebase_id.to_string(),
            })?;
        let embedding_provider = self
            .parts
            .knowledge
            .embedding_provider(kb.embedding_provider_id)
            .await?
            .ok_or_else(|| ChatError::NotFound {
                resource: "embedding provider",
                id: kb.embedding_provider_id.to_string(),
            })?;
        let embedder = self.parts.embedders.embedder(&embedding_provider)?;

        let (query, history) = split_latest(messages)?;
        let reformulator = QueryReformulator::new(
            self.config
                .reformulate_model
                .as_deref()
                .unwrap_or(&request.model),
            self.config.max_tokens,
            self.prompts.reformulate.clone(),
        );
        let standalone = reformulator
            .reformulate(provider.as_ref(), query, history)
            .await;

        let documents = self
            .gather_evidence(&standalone, &kb.name, embedder.as_ref())
            .await?;

        let prompt = self.prompts.render_rag(
            query,
            &serialize_history(history),
            &join_context(&documents),
        );
        let mut chat = ChatRequest::new(&request.model, vec![user_message(&prompt)]);
        chat.max_tokens = Some(self.config.max_tokens);

        if !request.stream {
            let response = provider.chat(&chat).await?;
            info!(
                knowledge_base = %kb.name,
                documents = documents.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "grounded response complete"
            );
            return Ok(ChatReply::Complete(CompletionBody::new(
                response.content,
                Some(documents),
            )));
        }

        Ok(ChatReply::Stream(self.spawn_stream(cancel, move |sink| async move {
            let catalog = ToolCatalog::default();
            ToolLoop::new(provider.as_ref(), &catalog)
                .run_streaming(chat, &sink)
                .await?;
            sink.emit(OutboundEvent::RelevantDocuments(documents)).await
        })))
    }

    /// Retrieves evidence and, when a reranker is configured, keeps the
    /// best `top_n` (at most 4).
    async fn gather_evidence(
        &self,
        query: &str,
        collection: &str,
        embedder: &dyn Embedder,
    ) -> Result<Vec<EvidenceDocument>, ChatError> {
        let mut documents = self
            .parts
            .retriever
            .retrieve(query, collection, embedder)
            .await?;
        debug!(collection, retrieved = documents.len(), "evidence retrieved");

        if let Some(reranker) = &self.parts.reranker {
            let top_n = self.config.reranker.top_n();
            documents = reranker
                .rerank(documents, query, top_n)
                .await
                .map_err(|e| match e {
                    ChatError::Retrieval { .. } => e,
                    other => ChatError::Retrieval {
                        message: other.to_string(),
                    },
                })?;
            documents.truncate(top_n);
            debug!(kept = documents.len(), "evidence reranked");
        }

        Ok(documents)
    }

    async fn respond_with_tools(
        &self,
        provider: Arc<dyn LlmProvider>,
        request: &InboundRequest,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> Result<ChatReply, ChatError> {
        let start = Instant::now();
        let catalog = ToolCatalog::build(self.parts.tools.as_ref()).await?;

        let mut chat = ChatRequest::new(&request.model, messages);
        chat.max_tokens = Some(self.config.max_tokens);
        if provider.supports_tool_binding() {
            chat = chat.with_tools(catalog.definitions());
        } else {
            debug!(provider = provider.name(), "provider does not bind tools");
        }

        let max_rounds = self.config.max_rounds;
        let concurrency = self.config.max_tool_concurrency;

        if !request.stream {
            let response = ToolLoop::new(provider.as_ref(), &catalog)
                .concurrency(concurrency)
                .run_single_turn(&chat)
                .await?;
            info!(
                tools = catalog.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "tool-calling response complete"
            );
            return Ok(ChatReply::Complete(CompletionBody::new(
                response.content,
                None,
            )));
        }

        Ok(ChatReply::Stream(self.spawn_stream(cancel, move |sink| async move {
            ToolLoop::new(provider.as_ref(), &catalog)
                .max_rounds(max_rounds)
                .concurrency(concurrency)
                .run_streaming(chat, &sink)
                .await
        })))
    }

    /// Runs `work` on a task feeding a bounded channel.
    ///
    /// A failure after streaming began becomes a final `error` event. The
    /// task stops as soon as the reader goes away or `cancel` fires.
    fn spawn_stream<F, Fut>(&self, cancel: CancellationToken, work: F) -> EventStream
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = Result<(), ChatError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
        let sink = EventSink::new(tx, cancel);
        let response = work(sink.clone());

        tokio::spawn(async move {
            tokio::select! {
                result = response => match result {
                    Ok(()) => debug!("stream complete"),
                    Err(ChatError::Cancelled) => debug!("stream cancelled"),
                    Err(e) => {
                        warn!(error = %e, "stream failed after output began");
                        if sink.emit(OutboundEvent::Error(e.to_string())).await.is_err() {
                            debug!("reader gone before error event");
                        }
                    }
                },
                () = sink.closed() => debug!("reader disconnected, abandoning response"),
            }
        });

        ReceiverStream::new(rx)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.parts.providers)
            .field("reranker", &self.parts.reranker.is_some())
            .field("max_rounds", &self.config.max_rounds)
            .finish_non_exhaustive()
    }
}
