//! Knowledge-base store.
//!
//! [`KnowledgeStore`] is what the orchestrator needs: resolve a knowledge
//! base and its embedding provider by id. [`SqliteStore`] is the bundled
//! implementation and also holds the embedded passages the vector
//! retriever scans.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ChatError;

/// A named document collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeBase {
    /// Primary key.
    pub id: i64,
    /// Collection name; also the key passages are stored under.
    pub name: String,
    /// Provider used to embed this collection's passages and queries.
    pub embedding_provider_id: i64,
}

/// An embedding model endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingProvider {
    /// Primary key.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Embedding model identifier.
    pub model: String,
    /// `OpenAI`-compatible endpoint; the default API when absent.
    pub base_url: Option<String>,
}

/// A stored passage with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Primary key.
    pub id: i64,
    /// Passage text.
    pub content: String,
    /// Metadata as stored.
    pub metadata: Value,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// Lookup interface the orchestrator resolves knowledge bases through.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Finds a knowledge base by id.
    async fn knowledge_base(&self, id: i64) -> Result<Option<KnowledgeBase>, ChatError>;

    /// Finds an embedding provider by id.
    async fn embedding_provider(&self, id: i64) -> Result<Option<EmbeddingProvider>, ChatError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS embedding_providers (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    model       TEXT NOT NULL,
    base_url    TEXT
);

CREATE TABLE IF NOT EXISTS knowledge_bases (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    name                    TEXT NOT NULL UNIQUE,
    embedding_provider_id   INTEGER NOT NULL REFERENCES embedding_providers(id)
);

CREATE TABLE IF NOT EXISTS documents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    collection  TEXT NOT NULL,
    content     TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}',
    embedding   BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection);
";

/// `SQLite`-backed knowledge store.
///
/// The connection sits behind a mutex since `rusqlite::Connection` is not
/// `Sync`. Synchronous methods serve the CLI; the [`KnowledgeStore`] lookups
/// run on the blocking pool so a busy connection never stalls a runtime
/// worker.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database file. Call [`SqliteStore::init`]
    /// before first use.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ChatError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        debug!(path = %path.display(), "opened knowledge store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] if `SQLite` cannot allocate it.
    pub fn in_memory() -> Result<Self, ChatError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates the schema if it does not exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn init(&self) -> Result<(), ChatError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        info!("knowledge store schema ready");
        Ok(())
    }

    /// Whether the schema has been created.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn is_initialized(&self) -> Result<bool, ChatError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'knowledge_bases'",
                [],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        // A panic mid-query leaves no partial state we depend on.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    /// Runs `f` against the connection on tokio's blocking pool.
    async fn with_conn_blocking<T, F>(&self, f: F) -> Result<T, ChatError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, ChatError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| ChatError::Retrieval {
            message: format!("knowledge store task failed: {e}"),
        })?
    }

    #[cfg(test)]
    pub(crate) fn lock_for_test(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn add_embedding_provider(
        &self,
        name: &str,
        model: &str,
        base_url: Option<&str>,
    ) -> Result<EmbeddingProvider, ChatError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO embedding_providers (name, model, base_url) VALUES (?1, ?2, ?3)",
                params![name, model, base_url],
            )?;
            Ok(EmbeddingProvider {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                model: model.to_string(),
                base_url: base_url.map(str::to_string),
            })
        })
    }

    /// Lists embedding providers by id.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn list_embedding_providers(&self) -> Result<Vec<EmbeddingProvider>, ChatError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, model, base_url FROM embedding_providers ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(EmbeddingProvider {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    model: row.get(2)?,
                    base_url: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Creates a knowledge base bound to an existing embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] if the provider does not exist and
    /// [`ChatError::Storage`] on SQL failure (including a duplicate name).
    pub fn create_knowledge_base(
        &self,
        name: &str,
        embedding_provider_id: i64,
    ) -> Result<KnowledgeBase, ChatError> {
        self.with_conn(|conn| {
            if find_provider(conn, embedding_provider_id)?.is_none() {
                return Err(ChatError::NotFound {
                    resource: "embedding provider",
                    id: embedding_provider_id.to_string(),
                });
            }
            conn.execute(
                "INSERT INTO knowledge_bases (name, embedding_provider_id) VALUES (?1, ?2)",
                params![name, embedding_provider_id],
            )?;
            Ok(KnowledgeBase {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                embedding_provider_id,
            })
        })
    }

    /// Lists knowledge bases by id.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, ChatError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, embedding_provider_id FROM knowledge_bases ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(KnowledgeBase {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    embedding_provider_id: row.get(2)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Stores an embedded passage under `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn add_document(
        &self,
        collection: &str,
        content: &str,
        metadata: &Value,
        embedding: &[f32],
    ) -> Result<i64, ChatError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    collection,
                    content,
                    metadata.to_string(),
                    encode_vector(embedding)
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Loads every passage in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] on SQL failure.
    pub fn documents(&self, collection: &str) -> Result<Vec<StoredDocument>, ChatError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, metadata, embedding FROM documents
                 WHERE collection = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([collection], |row| {
                let metadata: String = row.get(2)?;
                let blob: Vec<u8> = row.get(3)?;
                Ok(StoredDocument {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
                    embedding: decode_vector(&blob),
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

fn find_provider(conn: &Connection, id: i64) -> Result<Option<EmbeddingProvider>, ChatError> {
    Ok(conn
        .query_row(
            "SELECT id, name, model, base_url FROM embedding_providers WHERE id = ?1",
            [id],
            |row| {
                Ok(EmbeddingProvider {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    model: row.get(2)?,
                    base_url: row.get(3)?,
                })
            },
        )
        .optional()?)
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn knowledge_base(&self, id: i64) -> Result<Option<KnowledgeBase>, ChatError> {
        self.with_conn_blocking(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, embedding_provider_id FROM knowledge_bases WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(KnowledgeBase {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            embedding_provider_id: row.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    async fn embedding_provider(&self, id: i64) -> Result<Option<EmbeddingProvider>, ChatError> {
        self.with_conn_blocking(move |conn| find_provider(conn, id))
            .await
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

/// Encodes a vector as little-endian `f32` bytes.
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decodes little-endian `f32` bytes; a trailing partial value is ignored.
fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .filter_map(|b| <[u8; 4]>::try_from(b).ok())
        .map(f32::from_le_bytes)
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap_or_else(|e| panic!("in_memory failed: {e}"));
        store.init().unwrap_or_else(|e| panic!("init failed: {e}"));
        store
    }

    #[test]
    fn test_vector_encoding() {
        let v = vec![0.5_f32, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)), v);
        assert!(decode_vector(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_is_initialized_tracks_schema() {
        let raw = SqliteStore::in_memory().unwrap_or_else(|e| panic!("in_memory failed: {e}"));
        assert!(!raw.is_initialized().unwrap_or_else(|e| panic!("{e}")));
        raw.init().unwrap_or_else(|e| panic!("init failed: {e}"));
        assert!(raw.is_initialized().unwrap_or_else(|e| panic!("{e}")));
    }

    #[test]
    fn test_list_embedding_providers() {
        let store = store();
        store
            .add_embedding_provider("local", "nomic-embed-text", Some("http://localhost:11434/v1"))
            .unwrap_or_else(|e| panic!("{e}"));
        store
            .add_embedding_provider("openai", "text-embedding-3-small", None)
            .unwrap_or_else(|e| panic!("{e}"));
        let providers = store.list_embedding_providers().unwrap_or_else(|e| panic!("{e}"));
        let names: Vec<_> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["local", "openai"]);
        assert_eq!(providers[1].base_url, None);
    }

    #[test]
    fn test_init_is_idempotent() {
        let store = store();
        store.init().unwrap_or_else(|e| panic!("second init failed: {e}"));
    }

    #[tokio::test]
    async fn test_knowledge_base_lookup() {
        let store = store();
        let provider = store
            .add_embedding_provider("local", "text-embedding-3-small", None)
            .unwrap_or_else(|e| panic!("add provider failed: {e}"));
        let kb = store
            .create_knowledge_base("handbook", provider.id)
            .unwrap_or_else(|e| panic!("create kb failed: {e}"));

        let found = store
            .knowledge_base(kb.id)
            .await
            .unwrap_or_else(|e| panic!("lookup failed: {e}"));
        assert_eq!(found, Some(kb.clone()));

        let found_provider = store
            .embedding_provider(kb.embedding_provider_id)
            .await
            .unwrap_or_else(|e| panic!("provider lookup failed: {e}"));
        assert_eq!(found_provider, Some(provider));

        let missing = store
            .knowledge_base(999_999)
            .await
            .unwrap_or_else(|e| panic!("lookup failed: {e}"));
        assert!(missing.is_none());
    }

    #[test]
    fn test_create_kb_requires_provider() {
        let store = store();
        let result = store.create_knowledge_base("orphan", 42);
        assert!(matches!(result, Err(ChatError::NotFound { .. })));
    }

    #[test]
    fn test_duplicate_kb_name_rejected() {
        let store = store();
        let provider = store
            .add_embedding_provider("p", "m", Some("http://localhost:11434/v1"))
            .unwrap_or_else(|e| panic!("add provider failed: {e}"));
        store
            .create_knowledge_base("docs", provider.id)
            .unwrap_or_else(|e| panic!("create kb failed: {e}"));
        let result = store.create_knowledge_base("docs", provider.id);
        assert!(matches!(result, Err(ChatError::Storage(_))));
        assert_eq!(store.list_knowledge_bases().map(|v| v.len()).unwrap_or(0), 1);
    }

    #[test]
    fn test_documents_scoped_to_collection() {
        let store = store();
        store
            .add_document("a", "alpha", &json!({"page": 1}), &[1.0, 0.0])
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        store
            .add_document("b", "beta", &json!({}), &[0.0, 1.0])
            .unwrap_or_else(|e| panic!("add failed: {e}"));

        let docs = store
            .documents("a")
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "alpha");
        assert_eq!(docs[0].metadata["page"], 1);
        assert_eq!(docs[0].embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let path = dir.path().join("ragline.db");
        {
            let store = SqliteStore::open(&path).unwrap_or_else(|e| panic!("open failed: {e}"));
            store.init().unwrap_or_else(|e| panic!("init failed: {e}"));
            store
                .add_embedding_provider("p", "m", None)
                .unwrap_or_else(|e| panic!("add provider failed: {e}"));
        }
        let reopened = SqliteStore::open(&path).unwrap_or_else(|e| panic!("reopen failed: {e}"));
        reopened.init().unwrap_or_else(|e| panic!("init failed: {e}"));
        let kb = reopened.create_knowledge_base("persisted", 1);
        assert!(kb.is_ok());
    }

    #[tokio::test]
    #[allow(clippy::await_holding_lock)]
    async fn test_lookups_wait_off_the_runtime_thread() {
        let store = Arc::new(store());
        let provider = store
            .add_embedding_provider("p", "m", None)
            .unwrap_or_else(|e| panic!("{e}"))
            .id;
        let kb = store
            .create_knowledge_base("held", provider)
            .unwrap_or_else(|e| panic!("{e}"))
            .id;

        // While the connection is held, the single runtime thread must stay
        // free to drive timers.
        let guard = store.lock_for_test();
        let lookup = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.knowledge_base(kb).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!lookup.is_finished());
        drop(guard);

        let found = lookup
            .await
            .unwrap_or_else(|e| panic!("join failed: {e}"))
            .unwrap_or_else(|e| panic!("lookup failed: {e}"));
        assert_eq!(found.map(|k| k.name), Some("held".to_string()));
        let provider = store
            .embedding_provider(provider)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(provider.map(|p| p.model), Some("m".to_string()));
    }
}
