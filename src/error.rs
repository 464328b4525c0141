//! Error types for the response-orchestration core.
//!
//! Every collaborator failure is funnelled into [`ChatError`]. The HTTP
//! layer maps variants onto status codes via [`ChatError::status_code`];
//! reformulation failures never reach this type because the reformulator
//! absorbs them.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Errors raised while answering a chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request violates the caller contract (malformed tool-result turn,
    /// duplicate tool names, bad arguments).
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// A referenced resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of resource (e.g. `"knowledge base"`).
        resource: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// Evidence retrieval or reranking failed.
    #[error("retrieval failed: {message}")]
    Retrieval {
        /// Underlying failure.
        message: String,
    },

    /// Embedding the query failed.
    #[error("embedding failed: {message}")]
    Embedding {
        /// Underlying failure.
        message: String,
    },

    /// A resolved tool invocation failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// The tool registry could not be reached or listed.
    #[error("tool registry error: {message}")]
    ToolRegistry {
        /// Underlying failure.
        message: String,
    },

    /// The chat-model collaborator returned an error.
    #[error("model request failed: {message}")]
    UpstreamModel {
        /// Underlying failure.
        message: String,
        /// HTTP status reported by the provider, if any.
        status: Option<u16>,
    },

    /// The model stream broke mid-response.
    #[error("stream error: {message}")]
    Stream {
        /// Underlying failure.
        message: String,
    },

    /// The caller went away or the request was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// Knowledge-base store failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// No API key configured for the model provider.
    #[error("API key missing: set OPENAI_API_KEY or RAGLINE_API_KEY")]
    ApiKeyMissing,

    /// The requested model family has no provider.
    #[error("unsupported model family: {name}")]
    UnsupportedProvider {
        /// Family requested by the caller.
        name: String,
    },
}

impl ChatError {
    /// Shorthand for [`ChatError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// HTTP status code the surrounding server should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } | Self::UnsupportedProvider { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Retrieval { .. }
            | Self::Embedding { .. }
            | Self::ToolRegistry { .. }
            | Self::UpstreamModel { .. }
            | Self::Stream { .. } => 502,
            Self::ToolExecution { .. }
            | Self::Cancelled
            | Self::Storage(_)
            | Self::ApiKeyMissing => 500,
        }
    }
}
