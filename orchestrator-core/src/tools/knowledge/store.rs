//! `store` tool (spec §4.2): `{collection, information, metadata?}`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::knowledge::{KnowledgeStore, KnowledgeStoreError};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_STORE_KNOWLEDGE: &str = "store";

pub struct StoreKnowledgeTool {
    store: Arc<dyn KnowledgeStore>,
}

impl StoreKnowledgeTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StoreKnowledgeTool {
    fn name(&self) -> &str {
        TOOL_STORE_KNOWLEDGE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_STORE_KNOWLEDGE.to_string(),
            description: Some("Store a piece of information into a knowledge collection.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": { "type": "string" },
                    "information": { "type": "string" },
                    "metadata": { "type": "object" },
                },
                "required": ["collection", "information"],
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
        let information = args
            .get("information")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing information".to_string()))?;
        let metadata = args.get("metadata").cloned();

        let entry = self
            .store
            .store(collection, information, metadata)
            .await
            .map_err(|e| match e {
                KnowledgeStoreError::Transport(msg) => ToolSourceError::Transport(format!(
                    "{msg} (fall back to the MongoDB-backed knowledge store tool if this persists)"
                )),
                KnowledgeStoreError::Validation(msg) => ToolSourceError::InvalidInput(msg),
            })?;

        Ok(ToolCallContent {
            text: serde_json::to_string_pretty(&entry).unwrap_or_else(|_| entry.id.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::InMemoryKnowledgeStore;

    #[tokio::test]
    async fn stores_entry_and_returns_it() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let tool = StoreKnowledgeTool::new(store.clone());
        let out = tool
            .call(json!({"collection": "notes", "information": "hello"}), None)
            .await
            .unwrap();
        assert!(out.text.contains("hello"));
        let listed = store.list("notes", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
