//! `create_dir` tool: create a directory (and parents) under the working
//! folder. An ADD filesystem executor (SPEC_FULL §2.2) alongside the
//! spec-named five.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_CREATE_DIR: &str = "create_dir";

pub struct CreateDirTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
    /// Optional allow-list restricting resolved paths beyond `working_folder`
    /// (spec §4.2(b)); empty means no additional restriction.
    pub(crate) allowed_roots: Arc<Vec<std::path::PathBuf>>,
}

impl CreateDirTool {
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
impl Tool for CreateDirTool {
    fn name(&self) -> &str {
        TOOL_CREATE_DIR
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_CREATE_DIR.to_string(),
            description: Some("Create a directory, including any missing parents.".to_string()),
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
        std::fs::create_dir_all(&path)
            .map_err(|e| ToolSourceError::Transport(format!("create_dir {}: {e}", path.display())))?;
        Ok(ToolCallContent {
            text: format!("created {}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = Arc::new(dir.path().to_path_buf());
        let tool = CreateDirTool::new(root);
        tool.call(json!({"path": "a/b/c"}), None).await.unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }
}
