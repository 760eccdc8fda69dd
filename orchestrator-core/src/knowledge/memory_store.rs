//! In-memory `KnowledgeStore`, for tests and dev (spec §4.2 ADD). Grounded on
//! the teacher's `InMemoryVectorStore`: a `RwLock<HashMap>` per collection,
//! cosine similarity when an embedder is configured, keyword overlap
//! otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{cosine_similarity, keyword_overlap_score, Embedder, KnowledgeEntry, KnowledgeStore, KnowledgeStoreError};

struct StoredEntry {
    entry: KnowledgeEntry,
    embedding: Option<Vec<f32>>,
}

#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    collections: RwLock<HashMap<String, Vec<StoredEntry>>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            embedder: Some(embedder),
        }
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn find(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, KnowledgeStoreError> {
        let query_embedding = match &self.embedder {
            Some(e) => Some(e.embed(query).await.map_err(|e| {
                KnowledgeStoreError::Transport(format!("embed query: {e}"))
            })?),
            None => None,
        };

        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<KnowledgeEntry> = entries
            .iter()
            .map(|stored| {
                let score = match (&query_embedding, &stored.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => keyword_overlap_score(query, &stored.entry.information),
                };
                let mut entry = stored.entry.clone();
                entry.score = score;
                entry
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
            Some(e) => Some(
                e.embed(information)
                    .await
                    .map_err(|e| KnowledgeStoreError::Transport(format!("embed entry: {e}")))?,
            ),
            None => None,
        };
        let entry = KnowledgeEntry {
            id: Uuid::new_v4().to_string(),
            collection: collection.to_string(),
            information: information.to_string(),
            metadata: metadata.unwrap_or(Value::Null),
            score: 0.0,
        };
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(StoredEntry {
                entry: entry.clone(),
                embedding,
            });
        Ok(entry)
    }

    async fn list(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, KnowledgeStoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entries| entries.iter().take(limit).map(|s| s.entry.clone()).collect())
            .unwrap_or_default())
    }

    async fn popular(&self, limit: usize) -> Result<Vec<(String, usize)>, KnowledgeStoreError> {
        let collections = self.collections.read().await;
        let mut counts: Vec<(String, usize)> = collections
            .iter()
            .map(|(name, entries)| (name.clone(), entries.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(limit);
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_find_ranks_by_keyword_overlap() {
        let store = InMemoryKnowledgeStore::new();
        store.store("notes", "rust async runtimes", None).await.unwrap();
        store.store("notes", "baking sourdough bread", None).await.unwrap();

        let results = store.find("notes", "rust async", 5).await.unwrap();
        assert_eq!(results[0].information, "rust async runtimes");
    }

    #[tokio::test]
    async fn list_respects_limit() {
        let store = InMemoryKnowledgeStore::new();
        for i in 0..5 {
            store.store("c", &format!("entry {i}"), None).await.unwrap();
        }
        let results = store.list("c", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn popular_ranks_collections_by_entry_count() {
        let store = InMemoryKnowledgeStore::new();
        store.store("a", "x", None).await.unwrap();
        store.store("b", "x", None).await.unwrap();
        store.store("b", "y", None).await.unwrap();

        let popular = store.popular(10).await.unwrap();
        assert_eq!(popular[0].0, "b");
    }

    #[tokio::test]
    async fn find_on_unknown_collection_returns_empty() {
        let store = InMemoryKnowledgeStore::new();
        let results = store.find("nope", "q", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
