//! Evidence retrieval.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;
use tracing::debug;

use super::document::EvidenceDocument;
use super::embedding::Embedder;
use super::store::SqliteStore;
use crate::error::ChatError;

/// Fetches passages for a query from a named collection, most relevant
/// first. How many come back is the retriever's own policy.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieves evidence for `query` from `collection`.
    async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        embedder: &dyn Embedder,
    ) -> Result<Vec<EvidenceDocument>, ChatError>;
}

/// Brute-force cosine search over the vectors in a [`SqliteStore`].
#[derive(Debug)]
pub struct SqliteVectorRetriever {
    store: Arc<SqliteStore>,
    top_k: usize,
}

impl SqliteVectorRetriever {
    /// Creates a retriever returning at most `top_k` passages.
    #[must_use]
    pub fn new(store: Arc<SqliteStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Retriever for SqliteVectorRetriever {
    async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        embedder: &dyn Embedder,
    ) -> Result<Vec<EvidenceDocument>, ChatError> {
        let query_vector = embedder.embed_query(query).await?;
        let store = Arc::clone(&self.store);
        let owned_collection = collection.to_string();
        let top_k = self.top_k;

        // Loading and scoring are blocking work; keep them off the runtime.
        let (candidates, scored) = tokio::task::spawn_blocking(move || {
            rank(&store, &owned_collection, &query_vector, top_k)
        })
        .await
        .map_err(|e| ChatError::Retrieval {
            message: format!("retrieval task failed: {e}"),
        })??;

        debug!(
            collection,
            candidates,
            returned = scored.len(),
            "vector retrieval complete"
        );

        Ok(scored
            .into_iter()
            .map(|(score, doc)| doc.with_score(score))
            .collect())
    }
}

/// Loads `collection` and returns its size with the `top_k` best matches.
fn rank(
    store: &SqliteStore,
    collection: &str,
    query_vector: &[f32],
    top_k: usize,
) -> Result<(usize, Vec<(f32, EvidenceDocument)>), ChatError> {
    let stored = store
        .documents(collection)
        .map_err(|e| ChatError::Retrieval {
            message: format!("failed to load collection '{collection}': {e}"),
        })?;
    let candidates = stored.len();

    let mut scored: Vec<(f32, EvidenceDocument)> = stored
        .into_par_iter()
        .filter(|doc| doc.embedding.len() == query_vector.len())
        .map(|doc| {
            let score = cosine_similarity(query_vector, &doc.embedding);
            (score, EvidenceDocument::new(doc.content, doc.metadata))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    Ok((candidates, scored))
}

/// Cosine similarity; zero when either vector has no magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Embeds by keyword so tests control the query vector.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model(&self) -> &str {
            "keyword"
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ChatError> {
            if text.contains("fail") {
                return Err(ChatError::Embedding {
                    message: "unavailable".to_string(),
                });
            }
            Ok(if text.contains("rust") {
                vec![1.0, 0.0, 0.0]
            } else {
                vec![0.0, 1.0, 0.0]
            })
        }
    }

    fn seeded_store() -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap_or_else(|e| panic!("in_memory failed: {e}"));
        store.init().unwrap_or_else(|e| panic!("init failed: {e}"));
        let rows: [(&str, [f32; 3]); 4] = [
            ("Rust has ownership.", [0.9, 0.1, 0.0]),
            ("Python is dynamic.", [0.1, 0.9, 0.0]),
            ("Rust compiles to native code.", [0.8, 0.0, 0.2]),
            ("Unrelated.", [0.0, 0.0, 1.0]),
        ];
        for (text, vector) in rows {
            store
                .add_document("langs", text, &json!({"source": text}), &vector)
                .unwrap_or_else(|e| panic!("add failed: {e}"));
        }
        store
            .add_document("other", "Rust elsewhere.", &json!({}), &[1.0, 0.0, 0.0])
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        Arc::new(store)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_similarity() {
        let retriever = SqliteVectorRetriever::new(seeded_store(), 2);
        let docs = retriever
            .retrieve("tell me about rust", "langs", &KeywordEmbedder)
            .await
            .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "Rust has ownership.");
        assert_eq!(docs[1].text, "Rust compiles to native code.");
        let scores: Vec<f32> = docs.iter().filter_map(|d| d.score).collect();
        assert!(scores[0] >= scores[1]);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_collection_is_empty() {
        let retriever = SqliteVectorRetriever::new(seeded_store(), 5);
        let docs = retriever
            .retrieve("rust", "missing", &KeywordEmbedder)
            .await
            .unwrap_or_else(|e| panic!("retrieve failed: {e}"));
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let retriever = SqliteVectorRetriever::new(seeded_store(), 5);
        let result = retriever.retrieve("fail", "langs", &KeywordEmbedder).await;
        assert!(matches!(result, Err(ChatError::Embedding { .. })));
    }

    #[tokio::test]
    #[allow(clippy::await_holding_lock)]
    async fn test_busy_store_does_not_stall_runtime() {
        let store = seeded_store();
        let retriever = Arc::new(SqliteVectorRetriever::new(Arc::clone(&store), 1));

        let guard = store.lock_for_test();
        let pending = tokio::spawn({
            let retriever = Arc::clone(&retriever);
            async move { retriever.retrieve("rust", "langs", &KeywordEmbedder).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        drop(guard);

        let docs = pending
            .await
            .unwrap_or_else(|e| panic!("join failed: {e}"))
            .unwrap_or_else(|e| panic!("retrieve failed: {e}"));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Rust has ownership.");
    }
}
