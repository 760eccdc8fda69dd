//! Multi-edit tool: apply multiple find-and-replace operations to a single file in one call.
//!
//! Uses the same replacement logic as `apply_patch`'s update hunks. All edits are applied in sequence;
//! if any edit fails, none are applied (atomic).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::edit_file::replace as edit_replace;
use super::path::resolve_path_under;

/// Tool name for multi-edit.
pub const TOOL_MULTIEDIT: &str = "multiedit";

/// Tool that applies multiple edits to one file in a single call.
pub struct MultieditTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
    /// Optional allow-list restricting resolved paths beyond `working_folder`
    /// (spec §4.2(b)); empty means no additional restriction.
    pub(crate) allowed_roots: Arc<Vec<std::path::PathBuf>>,
}

impl MultieditTool {
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
impl Tool for MultieditTool {
    fn name(&self) -> &str {
        TOOL_MULTIEDIT
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_MULTIEDIT.to_string(),
            description: Some(
                "Apply multiple find-and-replace edits to a single file in one call. \
                 Edits are applied in order; all or none (atomic). Use Read first."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to working folder."
                    },
                    "edits": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "oldString": { "type": "string" },
                                "newString": { "type": "string" },
                                "replaceAll": { "type": "boolean", "default": false }
                            },
                            "required": ["oldString", "newString"]
                        },
                        "description": "List of edits to apply in order."
                    }
                },
                "required": ["path", "edits"]
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

        let edits = args
            .get("edits")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing or invalid edits array".to_string()))?;

        if edits.is_empty() {
            return Err(ToolSourceError::InvalidInput("edits must not be empty".to_string()));
        }

        let mut content = if path.exists() && !path.is_dir() {
            std::fs::read_to_string(&path)
                .map_err(|e| ToolSourceError::Transport(format!("failed to read file: {}", e)))?
        } else if path.is_dir() {
            return Err(ToolSourceError::InvalidInput(format!(
                "path is a directory: {}",
                path.display()
            )));
        } else {
            // New file: first edit must have empty oldString, newString = initial content
            let first = edits[0].as_object().ok_or_else(|| {
                ToolSourceError::InvalidInput("each edit must be an object".to_string())
            })?;
            let old = first.get("oldString").and_then(|v| v.as_str()).unwrap_or("");
            let new = first.get("newString").and_then(|v| v.as_str()).unwrap_or("");
            if !old.is_empty() {
                return Err(ToolSourceError::InvalidInput(
                    "file does not exist; first edit must have empty oldString with newString as full content".to_string(),
                ));
            }
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ToolSourceError::Transport(format!("failed to create parent dir: {}", e))
                    })?;
                }
            }
            let mut new_content = new.to_string();
            for (i, ed) in edits.iter().enumerate().skip(1) {
                let obj = ed.as_object().ok_or_else(|| {
                    ToolSourceError::InvalidInput("each edit must be an object".to_string())
                })?;
                let old_s = obj.get("oldString").and_then(|v| v.as_str()).unwrap_or("");
                let new_s = obj.get("newString").and_then(|v| v.as_str()).unwrap_or("");
                let replace_all = obj.get("replaceAll").and_then(|v| v.as_bool()).unwrap_or(false);
                if old_s == new_s {
                    return Err(ToolSourceError::InvalidInput(format!(
                        "edit {}: oldString and newString must differ",
                        i + 1
                    )));
                }
                new_content = edit_replace(&new_content, old_s, new_s, replace_all)
                    .map_err(|e| ToolSourceError::InvalidInput(format!("edit {}: {}", i + 1, e)))?;
            }
            std::fs::write(&path, &new_content).map_err(|e| {
                ToolSourceError::Transport(format!("failed to write file: {}", e))
            })?;
            return Ok(ToolCallContent {
                text: format!("Created file with {} edit(s).", edits.len()),
            });
        };

        for (i, ed) in edits.iter().enumerate() {
            let obj = ed.as_object().ok_or_else(|| {
                ToolSourceError::InvalidInput("each edit must be an object".to_string())
            })?;
            let old_s = obj.get("oldString").and_then(|v| v.as_str()).unwrap_or("");
            let new_s = obj.get("newString").and_then(|v| v.as_str()).unwrap_or("");
            let replace_all = obj.get("replaceAll").and_then(|v| v.as_bool()).unwrap_or(false);
            if old_s == new_s {
                return Err(ToolSourceError::InvalidInput(format!(
                    "edit {}: oldString and newString must differ",
                    i + 1
                )));
            }
            content = edit_replace(&content, old_s, new_s, replace_all)
                .map_err(|e| ToolSourceError::InvalidInput(format!("edit {}: {}", i + 1, e)))?;
        }

        std::fs::write(&path, &content)
            .map_err(|e| ToolSourceError::Transport(format!("failed to write file: {}", e)))?;

        Ok(ToolCallContent {
            text: format!("Applied {} edit(s) successfully.", edits.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn applies_edits_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "alpha beta gamma").unwrap();

        let tool = MultieditTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(
                json!({
                    "path": "notes.txt",
                    "edits": [
                        {"oldString": "alpha", "newString": "one"},
                        {"oldString": "gamma", "newString": "three"}
                    ]
                }),
                None,
            )
            .await
            .unwrap();

        assert!(result.text.contains("2 edit"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one beta three");
    }

    #[tokio::test]
    async fn rejects_identical_old_and_new_string() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "same").unwrap();

        let tool = MultieditTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool
            .call(
                json!({
                    "path": "notes.txt",
                    "edits": [{"oldString": "same", "newString": "same"}]
                }),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn creates_new_file_when_first_edit_has_empty_old_string() {
        let dir = tempdir().unwrap();
        let tool = MultieditTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(
                json!({
                    "path": "fresh.txt",
                    "edits": [{"oldString": "", "newString": "hello world"}]
                }),
                None,
            )
            .await
            .unwrap();

        assert!(result.text.contains("Created file"));
        assert_eq!(std::fs::read_to_string(dir.path().join("fresh.txt")).unwrap(), "hello world");
    }
}
