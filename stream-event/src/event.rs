//! Client-facing streaming wire shapes: outbound events and the one inbound message.
//!
//! These are exactly the shapes in the client streaming channel: token, tool_call,
//! tool_result, tool_result_chunk, done, error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound message from the client: a new user turn.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientMessage {
    pub content: String,
}

/// A tool result payload, chunked or whole.
#[derive(Clone, Debug, Serialize)]
pub struct ToolResultPayload {
    pub id: String,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolResultChunk {
    pub id: String,
    pub chunk: String,
    pub index: usize,
    pub total: usize,
    pub done: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolResultChunkPayload {
    pub id: String,
    pub result: ToolResultChunk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

/// Outbound event sent to the client over the framed streaming channel.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Token {
        content: String,
    },
    ToolCall {
        tool: String,
        args: Value,
        id: String,
    },
    ToolResult {
        #[serde(rename = "toolResult")]
        tool_result: ToolResultPayload,
    },
    ToolResultChunk {
        #[serde(rename = "toolResult")]
        tool_result: ToolResultChunkPayload,
    },
    Done,
    Error {
        error: String,
    },
}

impl ClientEvent {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
