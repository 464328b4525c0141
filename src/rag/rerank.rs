//! Second-pass reranking of retrieved evidence.
//!
//! Optional: the orchestrator only holds a reranker when one is configured.
//! Failures are not softened; they surface as [`ChatError::Retrieval`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::document::EvidenceDocument;
use crate::agent::config::{RERANK_MAX_DOCUMENTS, RerankerConfig};
use crate::error::ChatError;

/// Re-scores documents against a query and keeps the best `top_n`.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reranks `documents`, returning at most `top_n`, best first.
    async fn rerank(
        &self,
        documents: Vec<EvidenceDocument>,
        query: &str,
        top_n: usize,
    ) -> Result<Vec<EvidenceDocument>, ChatError>;
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    relevance_score: f32,
}

/// Reranker for services exposing `POST {base}/rerank`.
#[derive(Debug, Clone)]
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpReranker {
    /// Builds a reranker from configuration; `Ok(None)` when disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Retrieval`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &RerankerConfig,
        timeout: std::time::Duration,
    ) -> Result<Option<Self>, ChatError> {
        let Some(api_key) = config.api_key.as_deref() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Retrieval {
                message: format!("failed to build reranker client: {e}"),
            })?;
        Ok(Some(Self {
            client,
            endpoint: format!("{}/rerank", config.base_url().trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: config.model().to_string(),
        }))
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        documents: Vec<EvidenceDocument>,
        query: &str,
        top_n: usize,
    ) -> Result<Vec<EvidenceDocument>, ChatError> {
        if documents.is_empty() {
            return Ok(documents);
        }
        let top_n = top_n.clamp(1, RERANK_MAX_DOCUMENTS);

        let body = RerankRequest {
            model: &self.model,
            query,
            documents: documents.iter().map(|d| d.text.as_str()).collect(),
            top_n,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Retrieval {
                message: format!("reranker request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChatError::Retrieval {
                message: format!("reranker returned {status}: {detail}"),
            });
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| ChatError::Retrieval {
            message: format!("invalid reranker response: {e}"),
        })?;

        let mut hits = parsed.results;
        hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

        let reranked: Vec<EvidenceDocument> = hits
            .into_iter()
            .filter_map(|hit| {
                documents
                    .get(hit.index)
                    .map(|doc| doc.clone().with_score(hit.relevance_score))
            })
            .take(top_n)
            .collect();

        debug!(
            candidates = documents.len(),
            kept = reranked.len(),
            "reranked evidence"
        );
        Ok(reranked)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    /// Serves `router` on an ephemeral port and returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("bind failed: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("local_addr failed: {e}"));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn reranker(base_url: String) -> HttpReranker {
        let config = RerankerConfig {
            api_key: Some("rk-test".to_string()),
            base_url: Some(base_url),
            model: None,
            top_n: None,
        };
        HttpReranker::from_config(&config, std::time::Duration::from_secs(5))
            .unwrap_or_else(|e| panic!("build failed: {e}"))
            .unwrap_or_else(|| panic!("reranker disabled"))
    }

    fn docs(n: usize) -> Vec<EvidenceDocument> {
        (0..n)
            .map(|i| EvidenceDocument::new(format!("passage {i}"), json!({"i": i})))
            .collect()
    }

    #[test]
    fn test_disabled_without_api_key() {
        let built = HttpReranker::from_config(
            &RerankerConfig::default(),
            std::time::Duration::from_secs(1),
        )
        .unwrap_or_else(|e| panic!("build failed: {e}"));
        assert!(built.is_none());
    }

    #[tokio::test]
    async fn test_rerank_orders_and_truncates() {
        // Scores favour later passages; the service ignores top_n.
        let router = Router::new().route(
            "/rerank",
            post(|Json(body): Json<Value>| async move {
                let count = body["documents"].as_array().map_or(0, Vec::len);
                let results: Vec<Value> = (0..count)
                    .map(|i| json!({"index": i, "relevance_score": i as f64 / 10.0}))
                    .collect();
                Json(json!({"results": results}))
            }),
        );
        let reranker = reranker(serve(router).await);

        let out = reranker
            .rerank(docs(6), "query", 10)
            .await
            .unwrap_or_else(|e| panic!("rerank failed: {e}"));

        assert_eq!(out.len(), RERANK_MAX_DOCUMENTS);
        assert_eq!(out[0].text, "passage 5");
        assert_eq!(out[3].text, "passage 2");
        assert!(out.iter().all(|d| d.score.is_some()));
    }

    #[tokio::test]
    async fn test_rerank_sends_expected_body() {
        let router = Router::new().route(
            "/rerank",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["query"], "what?");
                assert_eq!(body["model"], "rerank-v3.5");
                assert_eq!(body["top_n"], 2);
                Json(json!({"results": [{"index": 1, "relevance_score": 0.9}]}))
            }),
        );
        let reranker = reranker(serve(router).await);
        let out = reranker
            .rerank(docs(3), "what?", 2)
            .await
            .unwrap_or_else(|e| panic!("rerank failed: {e}"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "passage 1");
    }

    #[tokio::test]
    async fn test_rerank_error_is_retrieval_error() {
        let router = Router::new().route(
            "/rerank",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let reranker = reranker(serve(router).await);
        let result = reranker.rerank(docs(2), "q", 4).await;
        assert!(matches!(result, Err(ChatError::Retrieval { .. })));
    }

    #[tokio::test]
    async fn test_empty_input_skips_service() {
        let reranker = reranker("http://127.0.0.1:9".to_string());
        let out = reranker
            .rerank(Vec::new(), "q", 4)
            .await
            .unwrap_or_else(|e| panic!("rerank failed: {e}"));
        assert!(out.is_empty());
    }
}
