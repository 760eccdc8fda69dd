//! `delete_file` tool: remove a file or empty directory under the working
//! folder. An ADD filesystem executor (SPEC_FULL §2.2).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_DELETE_FILE: &str = "delete_file";

pub struct DeleteFileTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
    /// Optional allow-list restricting resolved paths beyond `working_folder`
    /// (spec §4.2(b)); empty means no additional restriction.
    pub(crate) allowed_roots: Arc<Vec<std::path::PathBuf>>,
}

impl DeleteFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self::with_allowed_roots(working_folder, Arc::new(Vec::new()))
    }

    /// Creates a new instance restricted to `allowed_roots` in addition to `working_folder`.
    pub fn with_allowed_roots(
        working_folder: Arc<std::path::PathBuf>,
        allowed_roots: Arc<Vec<std::path::PathBuf>>,
    ) -> Self {
        Self { working_folder, allowed_roots }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        TOOL_DELETE_FILE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_DELETE_FILE.to_string(),
            description: Some("Delete a file or empty directory.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"],
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let path = resolve_path_under(self.working_folder.as_ref(), &self.allowed_roots, path_param)?;
        let metadata = std::fs::symlink_metadata(&path)
            .map_err(|e| ToolSourceError::InvalidInput(format!("not found: {}: {e}", path.display())))?;
        let result = if metadata.is_dir() {
            std::fs::remove_dir(&path)
        } else {
            std::fs::remove_file(&path)
        };
        result.map_err(|e| ToolSourceError::Transport(format!("delete {}: {e}", path.display())))?;
        Ok(ToolCallContent {
            text: format!("deleted {}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deletes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();
        let tool = DeleteFileTool::new(Arc::new(dir.path().to_path_buf()));
        tool.call(json!({"path": "f.txt"}), None).await.unwrap();
        assert!(!dir.path().join("f.txt").exists());
    }

    #[tokio::test]
    async fn missing_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DeleteFileTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool.call(json!({"path": "nope.txt"}), None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }
}
