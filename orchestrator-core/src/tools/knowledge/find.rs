//! `find` tool (spec §4.2): `{collection, query, limit (default 5, max 20)}`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::knowledge::{KnowledgeStore, KnowledgeStoreError};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_FIND_KNOWLEDGE: &str = "find";

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;

pub struct FindKnowledgeTool {
    store: Arc<dyn KnowledgeStore>,
}

impl FindKnowledgeTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FindKnowledgeTool {
    fn name(&self) -> &str {
        TOOL_FIND_KNOWLEDGE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_FIND_KNOWLEDGE.to_string(),
            description: Some("Semantic search over a knowledge collection.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": { "type": "string" },
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_LIMIT },
                },
                "required": ["collection", "query"],
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let collection = args
            .get("collection")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing collection".to_string()))?;
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing query".to_string()))?;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).clamp(1, MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);

        let results = self.store.find(collection, query, limit).await.map_err(|e| match e {
            KnowledgeStoreError::Transport(msg) => ToolSourceError::Transport(format!(
                "{msg} (fall back to the MongoDB-backed knowledge search tool if this persists)"
            )),
            KnowledgeStoreError::Validation(msg) => ToolSourceError::InvalidInput(msg),
        })?;

        let payload = json!({ "collection": collection, "results": results });
        Ok(ToolCallContent {
            text: serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::InMemoryKnowledgeStore;

    #[tokio::test]
    async fn finds_stored_entries() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.store("notes", "rust async runtimes", None).await.unwrap();
        let tool = FindKnowledgeTool::new(store);
        let out = tool
            .call(json!({"collection": "notes", "query": "rust"}), None)
            .await
            .unwrap();
        assert!(out.text.contains("rust async runtimes"));
    }

    #[tokio::test]
    async fn clamps_limit_to_max() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let tool = FindKnowledgeTool::new(store);
        let out = tool
            .call(json!({"collection": "notes", "query": "x", "limit": 1000}), None)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert!(v["results"].as_array().unwrap().len() <= MAX_LIMIT);
    }
}
