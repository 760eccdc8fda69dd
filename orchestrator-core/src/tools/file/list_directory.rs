//! `list_directory` tool (spec §4.2): paginated, lexicographically sorted
//! directory listing of bare file names under the working folder.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use glob::Pattern;
use serde_json::json;
use walkdir::WalkDir;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_LIST_DIRECTORY: &str = "list_directory";

const DEFAULT_MAX_RESULTS: usize = 100;
const HARD_CAP: usize = 1000;

/// Directory entries skipped unless `showHidden` is true.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

pub struct ListDirectoryTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
    /// Optional allow-list restricting resolved paths beyond `working_folder`
    /// (spec §4.2(b)); empty means no additional restriction.
    pub(crate) allowed_roots: Arc<Vec<std::path::PathBuf>>,
}

impl ListDirectoryTool {
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
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        TOOL_LIST_DIRECTORY
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_LIST_DIRECTORY.to_string(),
            description: Some(
                "List files in a directory, paginated and lexicographically sorted.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "fileMask": { "type": "string", "description": "Glob matched against each entry's bare name." },
                    "offset": { "type": "integer", "minimum": 0 },
                    "maxResults": { "type": "integer", "minimum": 0 },
                    "recursive": { "type": "boolean" },
                    "showHidden": { "type": "boolean" },
                },
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
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(".");
        let directory = resolve_path_under(self.working_folder.as_ref(), &self.allowed_roots, path_param)?;
        if !directory.is_dir() {
            return Err(ToolSourceError::InvalidInput(format!(
                "not a directory: {}",
                directory.display()
            )));
        }

        let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let max_results = args
            .get("maxResults")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).min(HARD_CAP))
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .min(HARD_CAP);
        let recursive = args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);
        let show_hidden = args.get("showHidden").and_then(|v| v.as_bool()).unwrap_or(false);
        let file_mask = args
            .get("fileMask")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Pattern::new)
            .transpose()
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid fileMask: {e}")))?;

        let mut names = collect_names(&directory, recursive, show_hidden, file_mask.as_ref())?;
        names.sort();
        let count = names.len();

        let page: Vec<String> = if offset >= count {
            Vec::new()
        } else {
            names
                .into_iter()
                .skip(offset)
                .take(max_results)
                .collect()
        };

        let summary = if count == 0 {
            "Directory is empty".to_string()
        } else if offset >= count {
            format!("offset {offset} is past the end ({count} total files)")
        } else {
            format!(
                "Showing {}-{} of {} files",
                offset + 1,
                offset + page.len(),
                count
            )
        };

        let payload = json!({
            "directory": directory.display().to_string(),
            "count": count,
            "summary": summary,
            "files": page,
        });
        Ok(ToolCallContent {
            text: serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
        })
    }
}

fn collect_names(
    directory: &Path,
    recursive: bool,
    show_hidden: bool,
    file_mask: Option<&Pattern>,
) -> Result<Vec<String>, ToolSourceError> {
    let mut names = Vec::new();
    let walker = if recursive {
        WalkDir::new(directory)
    } else {
        WalkDir::new(directory).max_depth(1)
    };

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if entry.path() == directory {
            continue;
        }
        let name = match entry.file_name().to_str() {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !show_hidden && is_hidden(&name) {
            continue;
        }
        if let Some(mask) = file_mask {
            if !mask.matches(&name) {
                continue;
            }
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Arc<std::path::PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.txt", ".hidden"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let root = Arc::new(dir.path().to_path_buf());
        (dir, root)
    }

    #[tokio::test]
    async fn lists_sorted_bare_names_excluding_hidden_by_default() {
        let (_dir, root) = setup();
        let tool = ListDirectoryTool::new(root);
        let out = tool
            .call(json!({"path": "."}), None)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        let files: Vec<String> = v["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f.as_str().unwrap().to_string())
            .collect();
        assert_eq!(files, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(v["count"], 3);
    }

    #[tokio::test]
    async fn offset_past_count_yields_empty_files() {
        let (_dir, root) = setup();
        let tool = ListDirectoryTool::new(root);
        let out = tool
            .call(json!({"path": ".", "offset": 100}), None)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(v["files"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn pagination_reproduces_full_sorted_list() {
        let (_dir, root) = setup();
        let tool = ListDirectoryTool::new(root);
        let mut collected = Vec::new();
        for offset in [0usize, 2] {
            let out = tool
                .call(json!({"path": ".", "offset": offset, "maxResults": 2}), None)
                .await
                .unwrap();
            let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
            collected.extend(
                v["files"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|f| f.as_str().unwrap().to_string()),
            );
        }
        assert_eq!(collected, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn file_mask_filters_by_glob() {
        let (_dir, root) = setup();
        let tool = ListDirectoryTool::new(root);
        let out = tool
            .call(json!({"path": ".", "fileMask": "a.*"}), None)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(v["files"].as_array().unwrap().len(), 1);
    }
}
