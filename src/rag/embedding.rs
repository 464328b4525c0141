//! Query embedding.
//!
//! Each knowledge base names its embedding provider; the factory turns that
//! row into a client for the lifetime of one request.

use std::sync::Arc;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use tracing::debug;

use super::store::EmbeddingProvider;
use crate::error::ChatError;

/// Turns text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model used for embeddings.
    fn model(&self) -> &str;

    /// Embeds a single query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ChatError>;
}

/// Builds an [`Embedder`] for an embedding-provider row.
pub trait EmbedderFactory: Send + Sync {
    /// Creates the embedder.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Embedding`] if the provider cannot be used.
    fn embedder(&self, provider: &EmbeddingProvider) -> Result<Arc<dyn Embedder>, ChatError>;
}

/// Embedder for `OpenAI`-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    /// Creates an embedder for `model` at `base_url` (default API if `None`).
    #[must_use]
    pub fn new(api_key: &str, base_url: Option<&str>, model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ChatError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| ChatError::Embedding {
                message: format!("failed to build request: {e}"),
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| ChatError::Embedding {
                message: e.to_string(),
            })?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| ChatError::Embedding {
                message: "provider returned no embedding".to_string(),
            })?;
        debug!(model = %self.model, dimensions = embedding.len(), "embedded query");
        Ok(embedding)
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Factory producing [`OpenAiEmbedder`]s with a shared API key.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderFactory {
    api_key: String,
}

impl OpenAiEmbedderFactory {
    /// Creates the factory.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl EmbedderFactory for OpenAiEmbedderFactory {
    fn embedder(&self, provider: &EmbeddingProvider) -> Result<Arc<dyn Embedder>, ChatError> {
        if provider.model.trim().is_empty() {
            return Err(ChatError::Embedding {
                message: format!("embedding provider {} has no model", provider.id),
            });
        }
        Ok(Arc::new(OpenAiEmbedder::new(
            &self.api_key,
            provider.base_url.as_deref(),
            provider.model.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> EmbeddingProvider {
        EmbeddingProvider {
            id: 7,
            name: "local".to_string(),
            model: model.to_string(),
            base_url: Some("http://localhost:11434/v1".to_string()),
        }
    }

    #[test]
    fn test_factory_uses_provider_model() {
        let factory = OpenAiEmbedderFactory::new("sk-test");
        let embedder = factory
            .embedder(&provider("nomic-embed-text"))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(embedder.model(), "nomic-embed-text");
    }

    #[test]
    fn test_factory_rejects_blank_model() {
        let factory = OpenAiEmbedderFactory::new("sk-test");
        assert!(matches!(
            factory.embedder(&provider("  ")),
            Err(ChatError::Embedding { .. })
        ));
    }
}
