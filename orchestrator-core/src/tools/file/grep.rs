//! `grep` tool: regex content search over files under the working folder,
//! using the ripgrep library stack. An ADD filesystem executor (SPEC_FULL
//! §2.2).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::Searcher;
use ignore::WalkBuilder;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_GREP: &str = "grep";

const MAX_MATCHES: usize = 200;

pub struct GrepTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
    /// Optional allow-list restricting resolved paths beyond `working_folder`
    /// (spec §4.2(b)); empty means no additional restriction.
    pub(crate) allowed_roots: Arc<Vec<std::path::PathBuf>>,
}

impl GrepTool {
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
impl Tool for GrepTool {
    fn name(&self) -> &str {
        TOOL_GREP
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_GREP.to_string(),
            description: Some(
                "Search file contents for a regex pattern under a directory.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string" },
                    "path": { "type": "string" },
                },
                "required": ["pattern"],
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing pattern".to_string()))?
            .to_string();
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(".");
        let root = resolve_path_under(self.working_folder.as_ref(), &self.allowed_roots, path_param)?;

        let matcher = RegexMatcher::new(&pattern)
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid pattern: {e}")))?;

        let matches: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        for entry in WalkBuilder::new(&root).hidden(false).build().filter_map(|e| e.ok()) {
            if matches.lock().unwrap().len() >= MAX_MATCHES {
                break;
            }
            let Some(file_type) = entry.file_type() else { continue };
            if !file_type.is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            let matcher = matcher.clone();
            let matches = matches.clone();
            let result = Searcher::new().search_path(
                &matcher,
                &path,
                UTF8(|line_number, line| {
                    let mut m = matches.lock().unwrap();
                    if m.len() < MAX_MATCHES {
                        m.push(format!("{}:{}:{}", path.display(), line_number, line.trim_end()));
                    }
                    Ok(true)
                }),
            );
            if let Err(e) = result {
                tracing::debug!(path = %path.display(), error = %e, "grep: skipping unreadable file");
            }
        }

        let lines = Arc::try_unwrap(matches).unwrap().into_inner().unwrap();
        let count = lines.len();
        let payload = json!({ "count": count, "matches": lines });
        Ok(ToolCallContent {
            text: serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\nhello again\n").unwrap();
        let tool = GrepTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool.call(json!({"pattern": "hello"}), None).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(v["count"], 2);
    }

    #[tokio::test]
    async fn invalid_regex_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GrepTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool.call(json!({"pattern": "("}), None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }
}
