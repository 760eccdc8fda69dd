//! Persistent `KnowledgeStore` backed by SQLite + the `sqlite-vec` extension
//! (spec §4.2 ADD). Grounded on the teacher's `SqliteVecStore`: a metadata
//! table plus a `vec0` virtual table for KNN search, the extension
//! registered process-wide exactly once.
//!
//! Without an embedder, falls back to scoring every row in the collection
//! with the keyword-overlap heuristic — correct but O(collection size), the
//! same tradeoff the in-memory store makes.

use std::path::Path;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;
use uuid::Uuid;

use super::{keyword_overlap_score, Embedder, KnowledgeEntry, KnowledgeStore, KnowledgeStoreError};

static VEC_INIT: Once = Once::new();

fn register_vec_extension() {
    VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

pub struct SqliteKnowledgeStore {
    path: std::path::PathBuf,
    embedder: Option<Arc<dyn Embedder>>,
    embedding_dims: usize,
}

impl SqliteKnowledgeStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KnowledgeStoreError> {
        Self::with_embedder(path, None, 0)
    }

    pub fn with_embedder(
        path: impl AsRef<Path>,
        embedder: Option<Arc<dyn Embedder>>,
        embedding_dims: usize,
    ) -> Result<Self, KnowledgeStoreError> {
        register_vec_extension();
        let store = Self {
            path: path.as_ref().to_path_buf(),
            embedder,
            embedding_dims,
        };
        store.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS knowledge_entries (
                    id TEXT PRIMARY KEY,
                    collection TEXT NOT NULL,
                    information TEXT NOT NULL,
                    metadata TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS knowledge_entries_collection
                    ON knowledge_entries(collection);",
            )
        })?;
        if embedding_dims > 0 {
            let sql = format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_vec USING vec0(embedding float[{embedding_dims}])"
            );
            store.with_connection(move |conn| conn.execute_batch(&sql))?;
        }
        Ok(store)
    }

    /// Synchronous helper for one-time schema setup at construction, before
    /// any async caller exists.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, KnowledgeStoreError> {
        let conn = Connection::open(&self.path)
            .map_err(|e| KnowledgeStoreError::Transport(format!("open: {e}")))?;
        f(&conn).map_err(|e| KnowledgeStoreError::Transport(format!("query: {e}")))
    }

    async fn run<T: Send + 'static>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    ) -> Result<T, KnowledgeStoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)
                .map_err(|e| KnowledgeStoreError::Transport(format!("open: {e}")))?;
            f(&conn).map_err(|e| KnowledgeStoreError::Transport(format!("query: {e}")))
        })
        .await
        .map_err(|e| KnowledgeStoreError::Transport(format!("join: {e}")))?
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn find(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, KnowledgeStoreError> {
        if let Some(embedder) = &self.embedder {
            if self.embedding_dims > 0 {
                let query_embedding = embedder
                    .embed(query)
                    .await
                    .map_err(|e| KnowledgeStoreError::Transport(format!("embed query: {e}")))?;
                let collection = collection.to_string();
                let blob = bytemuck_cast(&query_embedding);
                return self
                    .run(move |conn| {
                        let mut stmt = conn.prepare(
                            "SELECT e.id, e.collection, e.information, e.metadata, v.distance
                             FROM knowledge_vec v
                             JOIN knowledge_entries e ON e.rowid = v.rowid
                             WHERE v.embedding MATCH ?1 AND k = ?2 AND e.collection = ?3
                             ORDER BY v.distance",
                        )?;
                        let rows = stmt.query_map(
                            rusqlite::params![blob, limit as i64, collection],
                            |row| {
                                let distance: f64 = row.get(4)?;
                                Ok(KnowledgeEntry {
                                    id: row.get(0)?,
                                    collection: row.get(1)?,
                                    information: row.get(2)?,
                                    metadata: serde_json::from_str(&row.get::<_, String>(3)?)
                                        .unwrap_or(Value::Null),
                                    score: (1.0 / (1.0 + distance)) as f32,
                                })
                            },
                        )?;
                        rows.collect::<rusqlite::Result<Vec<_>>>()
                    })
                    .await;
            }
        }

        // Keyword-overlap fallback: fetch the collection, score in Rust.
        let collection = collection.to_string();
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, collection, information, metadata FROM knowledge_entries WHERE collection = ?1",
                )?;
                let rows = stmt.query_map([collection], |row| {
                    Ok(KnowledgeEntry {
                        id: row.get(0)?,
                        collection: row.get(1)?,
                        information: row.get(2)?,
                        metadata: serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or(Value::Null),
                        score: 0.0,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        let mut scored: Vec<KnowledgeEntry> = rows
            .into_iter()
            .map(|mut e| {
                e.score = keyword_overlap_score(query, &e.information);
                e
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn store(
        &self,
        collection: &str,
        information: &str,
        metadata: Option<Value>,
    ) -> Result<KnowledgeEntry, KnowledgeStoreError> {
        let embedding = match &self.embedder {
            Some(e) if self.embedding_dims > 0 => Some(
                e.embed(information)
                    .await
                    .map_err(|e| KnowledgeStoreError::Transport(format!("embed entry: {e}")))?,
            ),
            _ => None,
        };

        let entry = KnowledgeEntry {
            id: Uuid::new_v4().to_string(),
            collection: collection.to_string(),
            information: information.to_string(),
            metadata: metadata.unwrap_or(Value::Null),
            score: 0.0,
        };
        let insert = entry.clone();
        let metadata_json = serde_json::to_string(&insert.metadata).unwrap_or_else(|_| "null".to_string());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO knowledge_entries (id, collection, information, metadata) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![insert.id, insert.collection, insert.information, metadata_json],
            )?;
            if let Some(embedding) = &embedding {
                let rowid: i64 = conn.query_row(
                    "SELECT rowid FROM knowledge_entries WHERE id = ?1",
                    [&insert.id],
                    |row| row.get(0),
                )?;
                conn.execute(
                    "INSERT INTO knowledge_vec (rowid, embedding) VALUES (?1, ?2)",
                    rusqlite::params![rowid, bytemuck_cast(embedding)],
                )?;
            }
            Ok(())
        })
        .await?;
        Ok(entry)
    }

    async fn list(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, KnowledgeStoreError> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, collection, information, metadata FROM knowledge_entries WHERE collection = ?1 LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![collection, limit as i64], |row| {
                Ok(KnowledgeEntry {
                    id: row.get(0)?,
                    collection: row.get(1)?,
                    information: row.get(2)?,
                    metadata: serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or(Value::Null),
                    score: 0.0,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn popular(&self, limit: usize) -> Result<Vec<(String, usize)>, KnowledgeStoreError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT collection, COUNT(*) as c FROM knowledge_entries GROUP BY collection ORDER BY c DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }
}

fn bytemuck_cast(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_list_and_find_without_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKnowledgeStore::open(dir.path().join("knowledge.db")).unwrap();
        store.store("notes", "rust async runtimes", None).await.unwrap();
        store.store("notes", "baking bread", None).await.unwrap();

        let listed = store.list("notes", 10).await.unwrap();
        assert_eq!(listed.len(), 2);

        let found = store.find("notes", "rust async", 5).await.unwrap();
        assert_eq!(found[0].information, "rust async runtimes");
    }

    #[tokio::test]
    async fn popular_orders_by_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKnowledgeStore::open(dir.path().join("knowledge.db")).unwrap();
        store.store("a", "x", None).await.unwrap();
        store.store("b", "x", None).await.unwrap();
        store.store("b", "y", None).await.unwrap();

        let popular = store.popular(10).await.unwrap();
        assert_eq!(popular[0].0, "b");
    }
}
