//! Retrieval side of the RAG branch.
//!
//! ```text
//! knowledge base id → KnowledgeStore → EmbedderFactory → Retriever
//!                                                   └→ Reranker (optional, ≤ 4)
//! ```

pub mod document;
pub mod embedding;
pub mod rerank;
pub mod retriever;
pub mod store;

pub use document::{EvidenceDocument, join_context};
pub use embedding::{Embedder, EmbedderFactory, OpenAiEmbedder, OpenAiEmbedderFactory};
pub use rerank::{HttpReranker, Reranker};
pub use retriever::{Retriever, SqliteVectorRetriever, cosine_similarity};
pub use store::{EmbeddingProvider, KnowledgeBase, KnowledgeStore, SqliteStore, StoredDocument};
