//! Persisted/in-context message shapes (spec §3: Message entity).
//!
//! Five roles: `system`, `user`, `assistant`, `tool_call`, `tool_result`. A
//! session's message list, converted to this neutral form, is what
//! `OrchestrationEngine` hands to `ChatStreamer` and what `SessionStore`
//! persists.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    ToolCall {
        #[serde(rename = "callId")]
        call_id: String,
        name: String,
        args: Value,
    },
    ToolResult {
        #[serde(rename = "callId")]
        call_id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolCall { .. } => "tool_call",
            Message::ToolResult { .. } => "tool_result",
        }
    }

    /// Textual content for contexts that render messages as plain strings
    /// (e.g. provider-neutral rendering of a tool result into the window).
    pub fn content_text(&self) -> String {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content } => content.clone(),
            Message::ToolCall { name, args, .. } => {
                format!("tool_call {name}({args})")
            }
            Message::ToolResult {
                name,
                output,
                error,
                duration_ms: _,
                ..
            } => match error {
                Some(e) => format!("tool_result {name} error: {e}"),
                None => format!(
                    "tool_result {name}: {}",
                    output
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_names_match_spec_roles() {
        assert_eq!(Message::System { content: String::new() }.role(), "system");
        assert_eq!(
            Message::ToolCall {
                call_id: "c1".into(),
                name: "ls".into(),
                args: json!({}),
            }
            .role(),
            "tool_call"
        );
    }

    #[test]
    fn tool_result_content_text_surfaces_error() {
        let m = Message::ToolResult {
            call_id: "c1".into(),
            name: "ls".into(),
            output: None,
            error: Some("boom".into()),
            duration_ms: 12,
        };
        assert!(m.content_text().contains("boom"));
    }
}
