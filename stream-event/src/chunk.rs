//! Chunked delivery for tool results over the soft size cap (§4.7).

use crate::event::{ClientEvent, ToolResultChunk, ToolResultChunkPayload, ToolResultPayload};
use serde_json::Value;

/// Splits `result` into one `ToolResult` event if its serialized form fits under
/// `soft_cap` bytes, else into an ordered sequence of `ToolResultChunk` events.
/// Chunk boundaries fall on UTF-8 character boundaries, never mid-codepoint.
pub fn frame_tool_result(
    id: &str,
    result: &Value,
    error: Option<String>,
    duration_ms: u64,
    soft_cap: usize,
) -> Vec<ClientEvent> {
    let serialized = match serde_json::to_string(result) {
        Ok(s) => s,
        Err(_) => return vec![],
    };
    if serialized.len() <= soft_cap {
        return vec![ClientEvent::ToolResult {
            tool_result: ToolResultPayload {
                id: id.to_string(),
                result: result.clone(),
                error,
                duration_ms,
            },
        }];
    }

    let pieces = split_on_char_boundaries(&serialized, soft_cap);
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| ClientEvent::ToolResultChunk {
            tool_result: ToolResultChunkPayload {
                id: id.to_string(),
                result: ToolResultChunk {
                    id: id.to_string(),
                    chunk,
                    index,
                    total,
                    done: index + 1 == total,
                },
                error: error.clone(),
                duration_ms,
            },
        })
        .collect()
}

fn split_on_char_boundaries(s: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 {
        return vec![s.to_string()];
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    while start < bytes.len() {
        let mut end = (start + max_len).min(bytes.len());
        while end < bytes.len() && !s.is_char_boundary(end) {
            end -= 1;
        }
        pieces.push(s[start..end].to_string());
        start = end;
    }
    if pieces.is_empty() {
        pieces.push(String::new());
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn small_result_is_not_chunked() {
        let events = frame_tool_result("call-1", &json!({"ok": true}), None, 5, 10_240);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ClientEvent::ToolResult { .. }));
    }

    #[test]
    fn large_result_chunks_with_final_done() {
        let big = "x".repeat(45 * 1024);
        let events = frame_tool_result("call-1", &json!(big), None, 5, 10 * 1024);
        assert!(events.len() > 1);
        for (i, ev) in events.iter().enumerate() {
            let ClientEvent::ToolResultChunk { tool_result } = ev else {
                panic!("expected chunk event")
            };
            assert_eq!(tool_result.result.index, i);
            assert_eq!(tool_result.result.total, events.len());
            assert_eq!(tool_result.result.done, i + 1 == events.len());
        }
    }

    #[test]
    fn reassembled_chunks_equal_original() {
        let original = serde_json::to_string(&json!("héllo 世界".repeat(2000))).unwrap();
        let pieces = split_on_char_boundaries(&original, 7);
        let reassembled: String = pieces.concat();
        assert_eq!(reassembled, original);
    }
}
