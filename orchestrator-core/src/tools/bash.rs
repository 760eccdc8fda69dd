//! `bash` tool (spec §4.2): run a shell command with a bounded timeout,
//! rooted at the working folder.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tokio::time::timeout;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_BASH: &str = "bash";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_BYTES: usize = 100 * 1024;

pub struct BashTool {
    pub(crate) working_folder: Arc<std::path::PathBuf>,
}

impl BashTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        TOOL_BASH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_BASH.to_string(),
            description: Some(
                "Run a shell command in the working folder and return its output.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "timeoutMs": { "type": "integer", "minimum": 1 },
                },
                "required": ["command"],
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing command".to_string()))?;
        let deadline = args
            .get("timeoutMs")
            .and_then(|v| v.as_u64())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let child = Command::new("bash")
            .arg("-lc")
            .arg(command)
            .current_dir(self.working_folder.as_ref())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolSourceError::Transport(format!("spawn bash: {e}")))?;

        let output = match timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolSourceError::Transport(format!("bash: {e}"))),
            Err(_) => return Err(ToolSourceError::Timeout),
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            text.push_str("\n--- stderr ---\n");
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if text.len() > MAX_OUTPUT_BYTES {
            text.truncate(MAX_OUTPUT_BYTES);
            text.push_str("\n... (truncated)");
        }
        if !output.status.success() {
            text.push_str(&format!("\n(exit status: {})", output.status));
        }

        Ok(ToolCallContent { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = BashTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool.call(json!({"command": "echo hi"}), None).await.unwrap();
        assert!(out.text.contains("hi"));
    }

    #[tokio::test]
    async fn timeout_surfaces_as_timeout_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = BashTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool
            .call(json!({"command": "sleep 5", "timeoutMs": 50}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::Timeout));
    }
}
