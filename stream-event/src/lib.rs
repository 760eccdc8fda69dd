//! Client streaming channel wire protocol: event shapes and chunked tool-result framing.
//!
//! This crate defines only the wire shape; it does not depend on the orchestration core.

pub mod chunk;
pub mod event;

pub use chunk::frame_tool_result;
pub use event::{ClientEvent, ClientMessage, ToolResultChunk, ToolResultChunkPayload, ToolResultPayload};
