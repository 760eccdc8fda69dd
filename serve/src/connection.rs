//! WebSocket `ClientConnection` (spec §4.7): one connection per session,
//! message-framed JSON both ways, 30s keepalive pings with a 60s missed-pong
//! deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use orchestrator_core::engine::{EventSink, TurnIdentity};
use stream_event::{ClientEvent, ClientMessage};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::app::AppState;
use crate::auth::AuthContext;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const PONG_DEADLINE: Duration = Duration::from_secs(60);

/// Serializes all writes to one client through a single sink, as spec §4.6's
/// ordering guarantees require.
struct WsSink {
    sender: AsyncMutex<SplitSink<WebSocket, WsMessage>>,
    connected: AtomicBool,
}

#[async_trait::async_trait]
impl EventSink for WsSink {
    async fn send(&self, event: ClientEvent) {
        let Ok(json) = serde_json::to_string(&event) else {
            return;
        };
        let mut sender = self.sender.lock().await;
        if sender.send(WsMessage::Text(json)).await.is_err() {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl WsSink {
    async fn ping(&self) -> bool {
        let mut sender = self.sender.lock().await;
        sender.send(WsMessage::Ping(Vec::new())).await.is_ok()
    }
}

pub(crate) async fn handle_socket(
    socket: WebSocket,
    session_id: String,
    auth: AuthContext,
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
) {
    let (sender, mut receiver) = socket.split();
    let sink = Arc::new(WsSink {
        sender: AsyncMutex::new(sender),
        connected: AtomicBool::new(true),
    });

    let mut last_pong = Instant::now();
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.tick().await; // first tick fires immediately

    // Turns run on their own task so a long-running turn never blocks this
    // loop's keepalive tick; `turn_cancellation` is cancelled on disconnect so
    // in-flight tool calls actually stop instead of running to completion for
    // a socket nobody is reading from anymore.
    let mut in_flight: Vec<tokio::task::JoinHandle<()>> = Vec::new();
    let turn_cancellation = CancellationToken::new();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        let Ok(client_message) = serde_json::from_str::<ClientMessage>(&text) else {
                            tracing::warn!(%session_id, "dropping unparseable client message");
                            continue;
                        };
                        let identity = TurnIdentity {
                            user_id: auth.user_id.clone(),
                            company_id: auth.company_id.clone(),
                        };
                        let engine = state.engine.clone();
                        let sink = sink.clone();
                        let session_id = session_id.clone();
                        let cancellation = turn_cancellation.clone();
                        in_flight.retain(|h| !h.is_finished());
                        in_flight.push(tokio::spawn(async move {
                            if let Err(e) = engine
                                .process_turn(&session_id, &identity, &client_message.content, sink, cancellation)
                                .await
                            {
                                tracing::warn!(%session_id, error = %e, "turn failed");
                            }
                        }));
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(%session_id, error = %e, "read error (client closed?)");
                        break;
                    }
                    _ => {}
                }
            }
            _ = keepalive.tick() => {
                if last_pong.elapsed() > PONG_DEADLINE {
                    tracing::warn!(%session_id, "missed pong deadline, closing connection");
                    break;
                }
                if !sink.ping().await {
                    break;
                }
            }
        }
    }

    turn_cancellation.cancel();
    sink.connected.store(false, Ordering::SeqCst);
    for handle in in_flight {
        let _ = handle.await;
    }
    if let Some(tx) = shutdown_tx {
        let _ = tx.send(());
    }
}
