//! Todo-write tool: replace the calling session's todo list in its scoped
//! XDG state directory (spec §4.2).
//!
//! Accepts a full list of todos (id, content, status, priority); writes JSON.
//! Uses [`cross_xdg`] for path. Interacts with [`Tool`](crate::tools::Tool).

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::todo_file_path;
use super::TodoInfo;

/// Tool name for writing the todo list.
pub const TOOL_TODO_WRITE: &str = "todo_write";

/// Tool that writes the calling session's todo list to XDG state home.
#[derive(Default)]
pub struct TodoWriteTool;

impl TodoWriteTool {
    pub fn new() -> Self {
        Self
    }
}

fn parse_todos(args: &serde_json::Value) -> Result<Vec<TodoInfo>, ToolSourceError> {
    let arr = args
        .get("todos")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ToolSourceError::InvalidInput("missing or invalid 'todos' array".to_string()))?;
    let mut out = Vec::with_capacity(arr.len());
    for (i, v) in arr.iter().enumerate() {
        let obj = v
            .as_object()
            .ok_or_else(|| ToolSourceError::InvalidInput(format!("todos[{}] must be an object", i)))?;
        let id = obj
            .get("id")
            .and_then(|x| x.as_str())
            .map(String::from)
            .ok_or_else(|| ToolSourceError::InvalidInput(format!("todos[{}] missing 'id'", i)))?;
        let content = obj
            .get("content")
            .and_then(|x| x.as_str())
            .map(String::from)
            .ok_or_else(|| ToolSourceError::InvalidInput(format!("todos[{}] missing 'content'", i)))?;
        let status = obj
            .get("status")
            .and_then(|x| x.as_str())
            .map(String::from)
            .unwrap_or_else(|| "pending".to_string());
        let priority = obj
            .get("priority")
            .and_then(|x| x.as_str())
            .map(String::from)
            .unwrap_or_else(|| "medium".to_string());
        out.push(TodoInfo {
            id,
            content,
            status,
            priority,
        });
    }
    Ok(out)
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        TOOL_TODO_WRITE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_TODO_WRITE.to_string(),
            description: Some("Write or replace the todo list.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "todos": { "type": "array" } },
                "required": ["todos"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let todos = parse_todos(&args)?;
        let path = todo_file_path(ctx)?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ToolSourceError::Transport(format!("failed to create parent dir: {}", e))
                })?;
            }
        }
        let json_bytes = serde_json::to_string_pretty(&todos).map_err(|e| {
            ToolSourceError::Transport(format!("failed to serialize todos: {}", e))
        })?;
        std::fs::write(&path, json_bytes).map_err(|e| {
            ToolSourceError::Transport(format!("failed to write {}: {}", path.display(), e))
        })?;
        let incomplete = todos
            .iter()
            .filter(|t| t.status != "completed")
            .count();
        let output = serde_json::to_string_pretty(&todos).unwrap_or_else(|_| "[]".to_string());
        Ok(ToolCallContent {
            text: format!("{} todos\n{}", incomplete, output),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::tool_source::{ToolCallContext, ToolSourceError};
    use crate::tools::Tool;

    use super::{TodoWriteTool, TOOL_TODO_WRITE};

    fn ctx() -> ToolCallContext {
        ToolCallContext::new(Vec::new())
            .with_session("sess-1")
            .with_owner("u1", "acme")
    }

    /// TodoWriteTool::name returns "todo_write".
    #[tokio::test]
    async fn todo_write_tool_name_returns_todo_write() {
        let tool = TodoWriteTool::new();
        assert_eq!(tool.name(), TOOL_TODO_WRITE);
    }

    /// TodoWriteTool::spec has name, description, and required "todos".
    #[tokio::test]
    async fn todo_write_tool_spec_has_todos_required() {
        let tool = TodoWriteTool::new();
        let spec = tool.spec();
        assert_eq!(spec.name, TOOL_TODO_WRITE);
        assert!(spec
            .description
            .as_ref()
            .map_or(false, |d| d.contains("todo") || d.contains("Write")));
        let required = spec
            .input_schema
            .get("required")
            .and_then(serde_json::Value::as_array)
            .unwrap();
        assert!(required.contains(&serde_json::json!("todos")));
    }

    /// call with valid todos writes file and returns count and list.
    #[tokio::test]
    async fn todo_write_call_valid_todos_writes_and_returns() {
        let _g = crate::tools::todo::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let args = serde_json::json!({
            "todos": [
                { "id": "a", "content": "First", "status": "pending", "priority": "high" },
                { "id": "b", "content": "Second", "status": "completed", "priority": "medium" }
            ]
        });
        let out = tool.call(args, Some(&ctx)).await.unwrap();
        assert!(out.text.contains("1 todos"));
        assert!(out.text.contains("First"));
        assert!(out.text.contains("Second"));
        let path = crate::tools::todo::todo_file_path(Some(&ctx)).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("First"));
        assert!(raw.contains("completed"));
    }

    /// call with missing "todos" returns InvalidInput.
    #[tokio::test]
    async fn todo_write_call_missing_todos_returns_invalid_input() {
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let result = tool.call(serde_json::json!({}), Some(&ctx)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
        assert!(err.to_string().to_lowercase().contains("todos"));
    }

    /// call with todos not an array returns InvalidInput.
    #[tokio::test]
    async fn todo_write_call_todos_not_array_returns_invalid_input() {
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let result = tool.call(serde_json::json!({ "todos": "not array" }), Some(&ctx)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    /// call with item missing "id" returns InvalidInput.
    #[tokio::test]
    async fn todo_write_call_item_missing_id_returns_invalid_input() {
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let result = tool
            .call(
                serde_json::json!({ "todos": [{ "content": "x", "status": "pending", "priority": "medium" }] }),
                Some(&ctx),
            )
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
        assert!(err.to_string().contains("id"));
    }

    /// call with item missing "content" returns InvalidInput.
    #[tokio::test]
    async fn todo_write_call_item_missing_content_returns_invalid_input() {
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let result = tool
            .call(
                serde_json::json!({ "todos": [{ "id": "1", "status": "pending", "priority": "medium" }] }),
                Some(&ctx),
            )
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
        assert!(err.to_string().contains("content"));
    }

    /// call with item as non-object returns InvalidInput.
    #[tokio::test]
    async fn todo_write_call_item_not_object_returns_invalid_input() {
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let result = tool.call(serde_json::json!({ "todos": ["string item"] }), Some(&ctx)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    /// call with optional status/priority uses defaults (pending, medium).
    #[tokio::test]
    async fn todo_write_call_default_status_and_priority() {
        let _g = crate::tools::todo::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let tool = TodoWriteTool::new();
        let ctx = ctx();
        let args = serde_json::json!({
            "todos": [{ "id": "1", "content": "Only required" }]
        });
        let out = tool.call(args, Some(&ctx)).await.unwrap();
        assert!(out.text.contains("1 todos"));
        let path = crate::tools::todo::todo_file_path(Some(&ctx)).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("pending"));
        assert!(raw.contains("medium"));
    }

    /// Without a session context, call fails rather than falling back to a shared file.
    #[tokio::test]
    async fn todo_write_call_without_context_fails() {
        let tool = TodoWriteTool::new();
        let args = serde_json::json!({
            "todos": [{ "id": "1", "content": "x" }]
        });
        let err = tool.call(args, None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }
}
