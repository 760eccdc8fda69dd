//! `KnowledgeStore` (spec §4.2, §6.2, §4.2's "vector + keyword fallback"):
//! semantic storage exposing `find`/`store`/`list`/`popular`.
//!
//! Two implementations, matching the teacher's in-memory/SQLite-vec split
//! (`memory::{InMemoryVectorStore, SqliteVecStore}`): [`memory_store`] for
//! tests/dev, [`sqlite_store`] for persistence. Both accept an optional
//! [`Embedder`]; without one they fall back to a naive keyword-overlap
//! scorer rather than failing.

pub mod embedder;
pub mod memory_store;
pub mod sqlite_store;

pub use embedder::{Embedder, EmbedderError};
pub use memory_store::InMemoryKnowledgeStore;
pub use sqlite_store::SqliteKnowledgeStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{ErrorKind, HasErrorKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub collection: String,
    pub information: String,
    #[serde(default)]
    pub metadata: Value,
    /// Relevance score for `find`/`popular` results; `0.0` for plain `list`.
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum KnowledgeStoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl HasErrorKind for KnowledgeStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            KnowledgeStoreError::Transport(_) => ErrorKind::TransportError,
            KnowledgeStoreError::Validation(_) => ErrorKind::ValidationError,
        }
    }
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Finds the `limit` (default 5, max 20 — enforced by the calling tool)
    /// entries in `collection` most relevant to `query`.
    async fn find(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, KnowledgeStoreError>;

    async fn store(
        &self,
        collection: &str,
        information: &str,
        metadata: Option<Value>,
    ) -> Result<KnowledgeEntry, KnowledgeStoreError>;

    async fn list(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, KnowledgeStoreError>;

    /// Collections ranked by stored-entry count, for `GET
    /// /knowledge/popular-collections`.
    async fn popular(&self, limit: usize) -> Result<Vec<(String, usize)>, KnowledgeStoreError>;
}

/// Keyword-overlap fallback scorer used when no embedder is configured:
/// fraction of query tokens present in the candidate text, case-insensitive.
pub(crate) fn keyword_overlap_score(query: &str, text: &str) -> f32 {
    let query_tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let hits = query_tokens
        .iter()
        .filter(|t| text_lower.contains(t.as_str()))
        .count();
    hits as f32 / query_tokens.len() as f32
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_overlap_scores_partial_match() {
        let score = keyword_overlap_score("rust async", "writing async code in rust");
        assert_eq!(score, 1.0);
        let score = keyword_overlap_score("rust golang", "writing async code in rust");
        assert_eq!(score, 0.5);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
