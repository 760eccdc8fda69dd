//! Tool description/result shapes and the shared tool-facing error taxonomy
//! (spec §4.1). `ToolRegistry` and every `Tool` impl speak these types.

pub mod context;
pub mod registry;
pub mod remote;

pub use context::ToolCallContext;
pub use registry::{ToolRegistry, ToolRegistryError};
pub use remote::{RemoteToolClient, RemoteToolClientError};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::{ErrorKind, HasErrorKind};

/// Descriptor exposed to the model: name, description, and JSON schema for
/// arguments. Mirrors `describeAll()`'s element shape (spec §4.1).
#[derive(Clone, Debug, Serialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A tool's successful result, rendered as text for the provider/client.
#[derive(Clone, Debug, Serialize)]
pub struct ToolCallContent {
    pub text: String,
}

/// Error taxonomy for `ToolRegistry::invoke` and individual `Tool::call`
/// implementations (spec §4.1): `NotFound, DuplicateName, InvalidSchema,
/// SchemaError, TransportError, ExecutorError, Timeout, Cancelled`.
/// `InvalidInput` is an additional, narrower variant built-in executors use
/// for malformed call arguments that don't warrant a full schema-validation
/// failure report.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("tool already registered: {0}")]
    DuplicateName(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("schema error: field {field}: {reason}")]
    SchemaError { field: String, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("executor error: {0}")]
    Executor(String),
    #[error("tool call timed out")]
    Timeout,
    #[error("tool call cancelled")]
    Cancelled,
}

impl HasErrorKind for ToolSourceError {
    fn kind(&self) -> ErrorKind {
        match self {
            ToolSourceError::NotFound(_) => ErrorKind::NotFound,
            ToolSourceError::DuplicateName(_) => ErrorKind::ValidationError,
            ToolSourceError::InvalidSchema(_) => ErrorKind::SchemaError,
            ToolSourceError::SchemaError { .. } => ErrorKind::SchemaError,
            ToolSourceError::InvalidInput(_) => ErrorKind::ValidationError,
            ToolSourceError::Transport(_) => ErrorKind::TransportError,
            ToolSourceError::Executor(_) => ErrorKind::ExecutorError,
            ToolSourceError::Timeout => ErrorKind::Timeout,
            ToolSourceError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// A tool result paired with how long its executor took, for `tool_result`
/// persistence and client delivery (spec §3 ToolResultRecord, §4.6.c).
#[derive(Clone, Debug)]
pub struct TimedToolResult {
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}
