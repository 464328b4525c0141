//! Orchestrator configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! Environment variables are only consulted when the builder's
//! [`from_env`](AgentConfigBuilder::from_env) step is called.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ChatError;

/// Default maximum tokens per model response.
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Default request timeout in seconds (reranker and tool registry calls).
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default number of tool-execution rounds per request.
const DEFAULT_MAX_ROUNDS: usize = 1;
/// Default number of tool invocations in flight at once.
const DEFAULT_MAX_TOOL_CONCURRENCY: usize = 4;
/// Default number of passages the bundled retriever returns.
const DEFAULT_RETRIEVAL_TOP_K: usize = 10;
/// Default capacity of the outbound event channel.
const DEFAULT_STREAM_BUFFER: usize = 16;
/// Default OpenAI-compatible endpoint for the `ollama` family.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
/// Hard ceiling on reranked evidence.
pub const RERANK_MAX_DOCUMENTS: usize = 4;
/// Default reranker endpoint.
pub const DEFAULT_RERANK_BASE_URL: &str = "https://api.cohere.com/v2";
/// Default reranker model.
pub const DEFAULT_RERANK_MODEL: &str = "rerank-v3.5";

/// Reranker settings. The reranker is disabled unless an API key is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RerankerConfig {
    /// API key for the reranking service.
    pub api_key: Option<String>,
    /// Base URL of the reranking service.
    pub base_url: Option<String>,
    /// Reranking model name.
    pub model: Option<String>,
    /// Number of documents to keep (clamped to [`RERANK_MAX_DOCUMENTS`]).
    pub top_n: Option<usize>,
}

impl RerankerConfig {
    /// Returns `true` when reranking should run.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Effective number of documents kept after reranking.
    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
            .unwrap_or(RERANK_MAX_DOCUMENTS)
            .clamp(1, RERANK_MAX_DOCUMENTS)
    }

    /// Effective base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_RERANK_BASE_URL)
    }

    /// Effective model name.
    #[must_use]
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_RERANK_MODEL)
    }
}

/// Configuration for the response orchestrator and its providers.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API key for the `openai` family.
    pub api_key: String,
    /// Optional base URL override for the `openai` family.
    pub base_url: Option<String>,
    /// Endpoint used for the `ollama` family.
    pub ollama_base_url: String,
    /// Model used to reformulate queries; defaults to the request's model.
    pub reformulate_model: Option<String>,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Request timeout for HTTP collaborators.
    pub timeout: Duration,
    /// Tool-execution rounds per streaming request. One round means tool
    /// results are terminal events and the model is not re-invoked.
    pub max_rounds: usize,
    /// Maximum tool invocations running concurrently within a round.
    pub max_tool_concurrency: usize,
    /// Passages returned by the bundled retriever.
    pub retrieval_top_k: usize,
    /// Capacity of the outbound event channel; a full channel pauses the
    /// model stream.
    pub stream_buffer: usize,
    /// Directory containing prompt template files.
    ///
    /// When set, templates are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for missing files.
    pub prompt_dir: Option<PathBuf>,
    /// Optional reranker.
    pub reranker: RerankerConfig,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    ollama_base_url: Option<String>,
    reformulate_model: Option<String>,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_rounds: Option<usize>,
    max_tool_concurrency: Option<usize>,
    retrieval_top_k: Option<usize>,
    stream_buffer: Option<usize>,
    prompt_dir: Option<PathBuf>,
    reranker: RerankerConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RAGLINE_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RAGLINE_BASE_URL"))
                .ok();
        }
        if self.ollama_base_url.is_none() {
            self.ollama_base_url = std::env::var("RAGLINE_OLLAMA_BASE_URL").ok();
        }
        if self.reformulate_model.is_none() {
            self.reformulate_model = std::env::var("RAGLINE_REFORMULATE_MODEL").ok();
        }
        if self.max_rounds.is_none() {
            self.max_rounds = env_parse("RAGLINE_MAX_ROUNDS");
        }
        if self.retrieval_top_k.is_none() {
            self.retrieval_top_k = env_parse("RAGLINE_RETRIEVAL_TOP_K");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RAGLINE_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.reranker.api_key.is_none() {
            self.reranker.api_key = std::env::var("RAGLINE_RERANK_API_KEY").ok();
        }
        if self.reranker.base_url.is_none() {
            self.reranker.base_url = std::env::var("RAGLINE_RERANK_BASE_URL").ok();
        }
        if self.reranker.model.is_none() {
            self.reranker.model = std::env::var("RAGLINE_RERANK_MODEL").ok();
        }
        if self.reranker.top_n.is_none() {
            self.reranker.top_n = env_parse("RAGLINE_RERANK_TOP_N");
        }
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the `ollama` family endpoint.
    #[must_use]
    pub fn ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_base_url = Some(url.into());
        self
    }

    /// Sets the reformulation model.
    #[must_use]
    pub fn reformulate_model(mut self, model: impl Into<String>) -> Self {
        self.reformulate_model = Some(model.into());
        self
    }

    /// Sets the maximum tokens per response.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the number of tool-execution rounds.
    #[must_use]
    pub const fn max_rounds(mut self, n: usize) -> Self {
        self.max_rounds = Some(n);
        self
    }

    /// Sets the tool invocation concurrency.
    #[must_use]
    pub const fn max_tool_concurrency(mut self, n: usize) -> Self {
        self.max_tool_concurrency = Some(n);
        self
    }

    /// Sets the retriever's top-k.
    #[must_use]
    pub const fn retrieval_top_k(mut self, n: usize) -> Self {
        self.retrieval_top_k = Some(n);
        self
    }

    /// Sets the outbound event channel capacity.
    #[must_use]
    pub const fn stream_buffer(mut self, n: usize) -> Self {
        self.stream_buffer = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the reranker configuration.
    #[must_use]
    pub fn reranker(mut self, reranker: RerankerConfig) -> Self {
        self.reranker = reranker;
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, ChatError> {
        let api_key = self.api_key.ok_or(ChatError::ApiKeyMissing)?;

        Ok(AgentConfig {
            api_key,
            base_url: self.base_url,
            ollama_base_url: self
                .ollama_base_url
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
            reformulate_model: self.reformulate_model,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_rounds: self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS).max(1),
            max_tool_concurrency: self
                .max_tool_concurrency
                .unwrap_or(DEFAULT_MAX_TOOL_CONCURRENCY)
                .max(1),
            retrieval_top_k: self.retrieval_top_k.unwrap_or(DEFAULT_RETRIEVAL_TOP_K),
            stream_buffer: self.stream_buffer.unwrap_or(DEFAULT_STREAM_BUFFER).max(1),
            prompt_dir: self.prompt_dir,
            reranker: self.reranker,
        })
    }
}
