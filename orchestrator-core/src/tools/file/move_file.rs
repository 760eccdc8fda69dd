//! `move_file` tool: rename/move a file or directory, both endpoints
//! resolved and checked under the working folder. An ADD filesystem
//! executor (SPEC_FULL §2.2).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_MOVE_FILE: &str = "move_file";

pub struct MoveFileTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
    /// Optional allow-list restricting resolved paths beyond `working_folder`
    /// (spec §4.2(b)); empty means no additional restriction.
    pub(crate) allowed_roots: Arc<Vec<std::path::PathBuf>>,
}

impl MoveFileTool {
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
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        TOOL_MOVE_FILE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_MOVE_FILE.to_string(),
            description: Some("Move or rename a file or directory.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sourcePath": { "type": "string" },
                    "destinationPath": { "type": "string" },
                },
                "required": ["sourcePath", "destinationPath"],
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let source_param = args
            .get("sourcePath")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing sourcePath".to_string()))?;
        let dest_param = args
            .get("destinationPath")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing destinationPath".to_string()))?;

        let source = resolve_path_under(self.working_folder.as_ref(), &self.allowed_roots, source_param)?;
        let destination = resolve_path_under(self.working_folder.as_ref(), &self.allowed_roots, dest_param)?;
        if !source.exists() {
            return Err(ToolSourceError::InvalidInput(format!(
                "source does not exist: {}",
                source.display()
            )));
        }
        if let Some(parent) = destination.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ToolSourceError::Transport(format!("create_dir_all {}: {e}", parent.display()))
                })?;
            }
        }
        std::fs::rename(&source, &destination).map_err(|e| {
            ToolSourceError::Transport(format!(
                "move {} -> {}: {e}",
                source.display(),
                destination.display()
            ))
        })?;
        Ok(ToolCallContent {
            text: format!("moved {} to {}", source.display(), destination.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn moves_file_between_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let tool = MoveFileTool::new(Arc::new(dir.path().to_path_buf()));
        tool.call(json!({"sourcePath": "a.txt", "destinationPath": "sub/b.txt"}), None)
            .await
            .unwrap();
        assert!(dir.path().join("sub/b.txt").exists());
        assert!(!dir.path().join("a.txt").exists());
    }
}
