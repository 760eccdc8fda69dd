//! `RemoteToolClient` (spec §4.3): a long-lived child process speaking
//! line-delimited JSON-RPC 2.0 over stdin/stdout, multiplexing concurrent
//! requests by id.
//!
//! Prior in-tree code (the teacher's `McpSession`) paired responses to
//! requests by blocking per-call polling rather than true concurrency, and
//! serialized nothing on the writer side. This version fixes both: one
//! writer mutex around stdin, one reader task decoding stdout and routing
//! responses to the matching `PendingRPC` by id.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::{ErrorKind, HasErrorKind};

/// `initialize`'s `protocolVersion` field. Kept from the teacher's handshake
/// shape verbatim.
pub const PROTOCOL_VERSION: &str = "2025-11-25";

#[derive(Debug, Error)]
pub enum RemoteToolClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("request timed out")]
    Timeout,
}

impl HasErrorKind for RemoteToolClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            RemoteToolClientError::Transport(_) => ErrorKind::TransportError,
            RemoteToolClientError::Rpc { .. } => ErrorKind::ExecutorError,
            RemoteToolClientError::Timeout => ErrorKind::Timeout,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteState {
    Starting,
    Initializing,
    Ready,
    Stopping,
    Stopped,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, RemoteToolClientError>>>>>;

/// Owns the child process and its `PendingRPC` map. One instance per
/// `serverName` (spec §3's RemoteToolServer).
pub struct RemoteToolClient {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
    state: RwLock<RemoteState>,
}

impl RemoteToolClient {
    /// Spawns `command args...`, performs the `initialize` /
    /// `notifications/initialized` handshake (30s deadline), and returns a
    /// client in the `Ready` state. On handshake failure the child is killed
    /// and the constructor fails — the client is never returned in a
    /// half-initialized state.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, RemoteToolClientError> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RemoteToolClientError::Transport(format!("spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RemoteToolClientError::Transport("no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RemoteToolClientError::Transport("no stdout pipe".to_string()))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        spawn_reader(stdout, pending.clone());

        let client = Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            state: RwLock::new(RemoteState::Starting),
        };

        *client.state.write().await = RemoteState::Initializing;
        client
            .send_request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "clientInfo": { "name": "orchestrator-core", "version": env!("CARGO_PKG_VERSION") },
                }),
                Duration::from_secs(30),
            )
            .await
            .map_err(|e| {
                error!(error = %e, "remote tool client initialize failed");
                e
            })?;
        client
            .send_notification("notifications/initialized", Value::Null)
            .await?;
        *client.state.write().await = RemoteState::Ready;

        Ok(client)
    }

    pub async fn state(&self) -> RemoteState {
        *self.state.read().await
    }

    /// Allocates a `PendingRPC`, writes the request atomically under the
    /// writer lock, then awaits the response with `deadline`. On any exit
    /// path (success, error, timeout) the pending entry is removed.
    pub async fn send_request(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, RemoteToolClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if let Err(e) = self.write_line(&frame).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let result = match timeout(deadline, rx).await {
            Ok(Ok(r)) => r,
            Ok(Err(_)) => Err(RemoteToolClientError::Transport(
                "response channel closed".to_string(),
            )),
            Err(_) => Err(RemoteToolClientError::Timeout),
        };
        self.pending.lock().await.remove(&id);
        result
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), RemoteToolClientError> {
        let frame = if params.is_null() {
            json!({ "jsonrpc": "2.0", "method": method })
        } else {
            json!({ "jsonrpc": "2.0", "method": method, "params": params })
        };
        self.write_line(&frame).await
    }

    async fn write_line(&self, frame: &Value) -> Result<(), RemoteToolClientError> {
        let mut line = serde_json::to_string(frame)
            .map_err(|e| RemoteToolClientError::Transport(format!("encode: {e}")))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RemoteToolClientError::Transport(format!("write: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| RemoteToolClientError::Transport(format!("flush: {e}")))
    }

    /// Forwards `invoke(name, args)` for a remote-backed tool as
    /// `tools/call`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        deadline: Duration,
    ) -> Result<Value, RemoteToolClientError> {
        self.send_request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
            deadline,
        )
        .await
    }

    pub async fn list_tools(&self, deadline: Duration) -> Result<Value, RemoteToolClientError> {
        self.send_request("tools/list", Value::Null, deadline).await
    }

    /// Kills the child, awaits its exit, and fails any still-pending calls.
    pub async fn stop(&self) {
        *self.state.write().await = RemoteState::Stopping;
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        let _ = child.wait().await;
        drop(child);

        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(RemoteToolClientError::Transport(
                "connection closed".to_string(),
            )));
        }
        *self.state.write().await = RemoteState::Stopped;
    }

    /// Current count of in-flight requests; used by tests asserting the map
    /// returns to its resting level after a turn (spec §8).
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

fn spawn_reader(stdout: tokio::process::ChildStdout, pending: PendingMap) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    route_response(&line, &pending).await;
                }
                Ok(None) => {
                    debug!("remote tool client stdout closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "remote tool client read error");
                    break;
                }
            }
        }
    });
}

async fn route_response(line: &str, pending: &PendingMap) {
    let parsed: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "remote tool client: malformed response line");
            return;
        }
    };
    let Some(id) = parsed.get("id").and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
    else {
        // Notification from the server; nothing to route.
        return;
    };

    let mut pending = pending.lock().await;
    let Some(tx) = pending.remove(&id) else {
        warn!(id, "remote tool client: response for unknown/expired id");
        return;
    };

    let result = if let Some(err) = parsed.get("error") {
        let code = err.get("code").and_then(|v| v.as_i64()).unwrap_or(-1);
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();
        Err(RemoteToolClientError::Rpc { code, message })
    } else {
        Ok(parsed.get("result").cloned().unwrap_or(Value::Null))
    };
    // Channel has capacity 1; if the receiver already dropped (deadline
    // expired), the send is simply discarded — logged, never panics.
    if tx.send(result).is_err() {
        debug!(id, "remote tool client: receiver already gone for response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_against_missing_binary_fails_cleanly() {
        let result = RemoteToolClient::spawn("definitely-not-a-real-binary-xyz", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn spawn_and_handshake_against_cat_echo() {
        // `cat` never speaks JSON-RPC, so the initialize call must time out
        // rather than hang or panic.
        let result = timeout(
            Duration::from_secs(2),
            RemoteToolClient::spawn("cat", &[]),
        )
        .await;
        assert!(result.is_err() || result.unwrap().is_err());
    }

    /// Three `send_request` calls in flight at once, with the response to the
    /// middle one deliberately delayed so it completes last. Responses must
    /// still route back to the caller whose id they carry, not to whichever
    /// caller happens to be waiting longest — the crux of the multiplexing
    /// this module exists for (spec §8).
    #[tokio::test]
    async fn concurrent_requests_route_by_id_not_arrival_order() {
        let script = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([0-9]*\)".*/\1/p')
  if [ "$id" = "3" ]; then sleep 0.3; fi
  printf '{"jsonrpc":"2.0","id":"%s","result":{"id":"%s"}}\n' "$id" "$id"
done
"#;
        let client = timeout(
            Duration::from_secs(5),
            RemoteToolClient::spawn("sh", &["-c".to_string(), script.to_string()]),
        )
        .await
        .expect("handshake should not time out")
        .expect("handshake against the mock shell server should succeed");
        let client = Arc::new(client);

        // ids 2, 3, 4: id 1 was consumed by the initialize handshake above.
        let mut handles = Vec::new();
        for _ in 0..3 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .send_request("tools/call", json!({}), Duration::from_secs(5))
                    .await
            }));
        }

        let mut ids_seen = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().expect("request should succeed");
            ids_seen.push(
                result
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap()
                    .to_string(),
            );
        }
        ids_seen.sort();
        assert_eq!(ids_seen, vec!["2", "3", "4"]);

        assert_eq!(client.pending_count().await, 0);

        client.stop().await;
    }
}
