//! `OrchestrationEngine` (spec §4.6): the streaming dispatch loop. One call
//! processes one user message and streams the full multi-iteration
//! interaction back over one [`EventSink`].
//!
//! Grounded on the teacher's `ActNode`/`ReactRunner` shape, restructured per
//! the redesign notes: the sequential `for tc in tool_calls` loop becomes a
//! `tokio::spawn` per tool call joined via `futures::stream::FuturesUnordered`
//! so concurrent tool calls within one iteration actually run concurrently.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashSet;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use stream_event::event::ClientEvent;
use stream_event::frame_tool_result;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chat::{ChatEvent, ChatStreamer, ChatStreamerError};
use crate::config_bridge::EngineBounds;
use crate::error::{ErrorKind, HasErrorKind};
use crate::message::Message;
use crate::prompt::{PromptStore, PromptStoreError};
use crate::session::{SessionStore, SessionStoreError};
use crate::tool_source::{ToolCallContext, ToolRegistry, ToolSourceError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session {0} is already processing a turn")]
    AlreadyProcessing(String),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    Prompt(#[from] PromptStoreError),
    #[error(transparent)]
    Chat(#[from] ChatStreamerError),
}

impl HasErrorKind for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::AlreadyProcessing(_) => ErrorKind::BudgetExceeded,
            EngineError::Session(e) => e.kind(),
            EngineError::Prompt(e) => e.kind(),
            EngineError::Chat(e) => e.kind(),
        }
    }
}

/// One serialized sink the engine writes client events through, so
/// concurrently-completing tool results never interleave (spec §4.6
/// "Ordering guarantees"). `serve`'s WebSocket `ClientConnection` implements
/// this; tests use an in-memory recorder.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: ClientEvent);

    /// Once false, the engine stops appending events but still completes
    /// in-flight persistence (spec §4.6 "Cancellation").
    fn is_connected(&self) -> bool {
        true
    }
}

/// Identity of the caller processing a turn, threaded through session/prompt
/// lookups and tool context.
#[derive(Clone, Debug)]
pub struct TurnIdentity {
    pub user_id: String,
    pub company_id: String,
}

struct ProcessingGuard<'a> {
    processing: &'a DashSet<String>,
    session_id: String,
}

impl<'a> Drop for ProcessingGuard<'a> {
    fn drop(&mut self) {
        self.processing.remove(&self.session_id);
    }
}

pub struct OrchestrationEngine {
    session_store: Arc<dyn SessionStore>,
    prompt_store: Arc<dyn PromptStore>,
    tool_registry: Arc<ToolRegistry>,
    chat_streamer: Arc<dyn ChatStreamer>,
    bounds: EngineBounds,
    processing: DashSet<String>,
}

impl OrchestrationEngine {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        prompt_store: Arc<dyn PromptStore>,
        tool_registry: Arc<ToolRegistry>,
        chat_streamer: Arc<dyn ChatStreamer>,
        bounds: EngineBounds,
    ) -> Self {
        Self {
            session_store,
            prompt_store,
            tool_registry,
            chat_streamer,
            bounds,
            processing: DashSet::new(),
        }
    }

    /// Processes one user turn on `session_id`, streaming events to `sink`
    /// until the turn is complete or an unrecoverable error occurs.
    ///
    /// `cancellation` is cancelled by the caller (e.g. on client disconnect)
    /// to stop in-flight tool calls early; a fresh, never-cancelled token is
    /// a valid choice when there is nothing to cancel against.
    pub async fn process_turn(
        &self,
        session_id: &str,
        identity: &TurnIdentity,
        user_message: &str,
        sink: Arc<dyn EventSink>,
        cancellation: CancellationToken,
    ) -> Result<(), EngineError> {
        if !self.processing.insert(session_id.to_string()) {
            return Err(EngineError::AlreadyProcessing(session_id.to_string()));
        }
        let _guard = ProcessingGuard {
            processing: &self.processing,
            session_id: session_id.to_string(),
        };

        match self.run_turn(session_id, identity, user_message, &sink, cancellation).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(session_id, error = %e, "turn failed");
                if sink.is_connected() {
                    sink.send(ClientEvent::Error { error: e.to_string() }).await;
                }
                Err(e)
            }
        }
    }

    async fn run_turn(
        &self,
        session_id: &str,
        identity: &TurnIdentity,
        user_message: &str,
        sink: &Arc<dyn EventSink>,
        cancellation: CancellationToken,
    ) -> Result<(), EngineError> {
        let company_id = identity.company_id.as_str();
        let user_id = identity.user_id.as_str();

        // Step 1: persist the user turn.
        let persisted_user = self
            .session_store
            .append_message(session_id, company_id, Message::User { content: user_message.to_string() })
            .await?;
        let original_user_message = persisted_user.message.clone();

        // Step 2: compose the message list.
        let session = self.session_store.get_session(session_id, company_id).await?;
        let system_prompt_text = match &session.active_specialist_id {
            Some(specialist_id) => {
                self.prompt_store
                    .get_specialist(specialist_id, user_id, company_id)
                    .await?
                    .system_prompt
            }
            None => self.prompt_store.get_system_prompt(user_id, company_id).await?,
        };

        let history = self
            .session_store
            .list_messages(session_id, company_id, usize::MAX, 0)
            .await?
            .messages;

        let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 1);
        if !system_prompt_text.is_empty() {
            messages.push(Message::System { content: system_prompt_text });
        }
        messages.extend(history.into_iter().map(|p| p.message));

        let mut full_response = String::new();
        let mut turn_ended_in_error = false;
        // Turn-local budget (spec §4.6.c): accumulates across every iteration
        // of this turn, not just the current one.
        let mut tool_call_count: u32 = 0;

        // Step 3: iterate.
        for _iteration in 0..self.bounds.max_iterations {
            if cancellation.is_cancelled() {
                break;
            }
            let windowed = apply_sliding_window(&messages, &original_user_message, self.bounds.sliding_window);
            let tool_descriptors = self.tool_registry.describe_all().await;
            let ctx = Arc::new(
                ToolCallContext::new(windowed.clone())
                    .with_session(session_id.to_string())
                    .with_owner(user_id.to_string(), company_id.to_string())
                    .with_cancellation(cancellation.clone()),
            );

            let chat_stream = self.chat_streamer.stream(&windowed, &tool_descriptors).await?;
            tokio::pin!(chat_stream);

            let mut had_tool_call = false;
            let mut budget_exhausted = false;
            let mut pending: FuturesUnordered<
                tokio::task::JoinHandle<(String, String, Result<crate::tool_source::ToolCallContent, ToolSourceError>, u64)>,
            > = FuturesUnordered::new();

            loop {
                tokio::select! {
                    biased;
                    next = chat_stream.next(), if !budget_exhausted => {
                        let Some(event) = next else { break };
                        match event {
                            ChatEvent::Token { content } => {
                                if crate::chat::looks_like_tool_call_leak(&content) {
                                    continue;
                                }
                                if sink.is_connected() {
                                    sink.send(ClientEvent::Token { content: content.clone() }).await;
                                }
                                full_response.push_str(&content);
                            }
                            ChatEvent::ToolCall { call_id, name, args } => {
                                had_tool_call = true;
                                self.session_store
                                    .append_tool_call(session_id, company_id, &call_id, &name, args.clone())
                                    .await?;
                                messages.push(Message::ToolCall {
                                    call_id: call_id.clone(),
                                    name: name.clone(),
                                    args: args.clone(),
                                });
                                if sink.is_connected() {
                                    sink.send(ClientEvent::ToolCall {
                                        tool: name.clone(),
                                        args: args.clone(),
                                        id: call_id.clone(),
                                    })
                                    .await;
                                }

                                tool_call_count += 1;
                                if tool_call_count > self.bounds.max_tool_calls {
                                    budget_exhausted = true;
                                    self.finish_tool_result(
                                        sink,
                                        session_id,
                                        company_id,
                                        &mut messages,
                                        call_id,
                                        name,
                                        Err(ToolSourceError::Executor("tool budget exhausted".to_string())),
                                        0,
                                    )
                                    .await?;
                                    break;
                                }

                                let registry = self.tool_registry.clone();
                                let ctx = ctx.clone();
                                let deadline_name = name.clone();
                                let call_args = args.clone();
                                pending.push(tokio::spawn(async move {
                                    let start = Instant::now();
                                    let result = registry.invoke(&deadline_name, call_args, Some(ctx.as_ref())).await;
                                    (call_id, deadline_name, result, start.elapsed().as_millis() as u64)
                                }));
                            }
                            ChatEvent::Error { error } => {
                                if sink.is_connected() {
                                    sink.send(ClientEvent::Error { error }).await;
                                }
                                turn_ended_in_error = true;
                                break;
                            }
                            ChatEvent::Done => {}
                        }
                    }
                    Some(joined) = pending.next() => {
                        let (call_id, name, result, duration_ms) = joined.map_err(|e| {
                            EngineError::Session(SessionStoreError::Transport(format!("tool task panicked: {e}")))
                        })?;
                        self.finish_tool_result(sink, session_id, company_id, &mut messages, call_id, name, result, duration_ms).await?;
                    }
                    else => break,
                }
            }

            // Drain any tool calls still in flight when the model's stream ended.
            while let Some(joined) = pending.next().await {
                let (call_id, name, result, duration_ms) = joined.map_err(|e| {
                    EngineError::Session(SessionStoreError::Transport(format!("tool task panicked: {e}")))
                })?;
                self.finish_tool_result(sink, session_id, company_id, &mut messages, call_id, name, result, duration_ms).await?;
            }

            if turn_ended_in_error {
                break;
            }
            if !had_tool_call {
                break;
            }
        }

        if sink.is_connected() {
            sink.send(ClientEvent::Done).await;
        }
        if !turn_ended_in_error {
            self.session_store
                .append_message(session_id, company_id, Message::Assistant { content: full_response })
                .await?;
        }
        info!(session_id, "turn complete");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_tool_result(
        &self,
        sink: &Arc<dyn EventSink>,
        session_id: &str,
        company_id: &str,
        messages: &mut Vec<Message>,
        call_id: String,
        name: String,
        result: Result<crate::tool_source::ToolCallContent, ToolSourceError>,
        duration_ms: u64,
    ) -> Result<(), EngineError> {
        let (output, error) = match result {
            Ok(content) => (Some(Value::String(content.text)), None),
            Err(e) => (None, Some(e.to_string())),
        };

        self.session_store
            .append_tool_result(session_id, company_id, &call_id, &name, output.clone(), error.clone(), duration_ms)
            .await?;

        if sink.is_connected() {
            let payload = output.clone().unwrap_or(Value::Null);
            for event in frame_tool_result(&call_id, &payload, error.clone(), duration_ms, self.bounds.chunk_soft_cap) {
                sink.send(event).await;
            }
        }

        messages.push(Message::ToolResult { call_id, name, output, error, duration_ms });
        Ok(())
    }
}

/// Spec §4.6 step 3a: keep (system message if present) + the original user
/// message of this turn + the last `window - 2` messages. If fewer messages
/// exist in total, keep all of them.
fn apply_sliding_window(messages: &[Message], original_user: &Message, window: usize) -> Vec<Message> {
    if messages.len() <= window {
        return messages.to_vec();
    }
    let mut result = Vec::with_capacity(window);
    if matches!(messages.first(), Some(Message::System { .. })) {
        result.push(messages[0].clone());
    }
    result.push(original_user.clone());

    let tail_budget = window.saturating_sub(result.len());
    if tail_budget > 0 {
        let tail_start = messages.len().saturating_sub(tail_budget);
        result.extend(messages[tail_start..].iter().cloned());
    }
    result
}

mod config_bridge {
    //! Narrows `env_config::EngineConfig` down to the fields the dispatch
    //! loop actually reads, so the engine doesn't depend on filesystem-tool
    //! knobs it has no use for.
    use std::time::Duration;

    #[derive(Clone, Debug)]
    pub struct EngineBounds {
        pub max_iterations: u32,
        pub max_tool_calls: u32,
        pub sliding_window: usize,
        pub chunk_soft_cap: usize,
        #[allow(dead_code)]
        pub per_tool_deadline: Duration,
    }

    impl From<&env_config::EngineConfig> for EngineBounds {
        fn from(cfg: &env_config::EngineConfig) -> Self {
            Self {
                max_iterations: cfg.max_iterations,
                max_tool_calls: cfg.max_tool_calls,
                sliding_window: cfg.sliding_window,
                chunk_soft_cap: cfg.chunk_soft_cap,
                per_tool_deadline: cfg.per_tool_deadline,
            }
        }
    }

    impl Default for EngineBounds {
        fn default() -> Self {
            Self::from(&env_config::EngineConfig::default())
        }
    }
}

pub use config_bridge::EngineBounds;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockChatStreamer;
    use crate::prompt::InMemoryPromptStore;
    use crate::session::InMemorySessionStore;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct RecordingSink {
        events: Mutex<Vec<ClientEvent>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { events: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn send(&self, event: ClientEvent) {
            self.events.lock().await.push(event);
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn spec(&self) -> crate::tool_source::ToolSpec {
            crate::tool_source::ToolSpec {
                name: "echo".to_string(),
                description: None,
                input_schema: json!({"type": "object"}),
            }
        }
        async fn call(
            &self,
            args: Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<crate::tool_source::ToolCallContent, ToolSourceError> {
            Ok(crate::tool_source::ToolCallContent {
                text: args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            })
        }
    }

    async fn build_engine(
        calls: Vec<Vec<ChatEvent>>,
    ) -> (OrchestrationEngine, Arc<InMemorySessionStore>) {
        let sessions = Arc::new(InMemorySessionStore::new());
        let prompts = Arc::new(InMemoryPromptStore::new());
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let streamer = Arc::new(MockChatStreamer::new(calls));
        let engine = OrchestrationEngine::new(
            sessions.clone(),
            prompts,
            registry,
            streamer,
            EngineBounds::default(),
        );
        (engine, sessions)
    }

    #[tokio::test]
    async fn simple_turn_with_no_tool_calls_persists_assistant_message() {
        let (engine, sessions) = build_engine(vec![vec![
            ChatEvent::Token { content: "Hello".to_string() },
            ChatEvent::Token { content: " there".to_string() },
            ChatEvent::Done,
        ]])
        .await;
        let session = sessions.create_session("u1", "c1", "t").await.unwrap();
        let sink = Arc::new(RecordingSink::new());
        let identity = TurnIdentity { user_id: "u1".to_string(), company_id: "c1".to_string() };

        engine
            .process_turn(&session.id, &identity, "hi", sink.clone(), CancellationToken::new())
            .await
            .unwrap();

        let page = sessions.list_messages(&session.id, "c1", 10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(matches!(page.messages[1].message, Message::Assistant { ref content } if content == "Hello there"));

        let events = sink.events.lock().await;
        assert!(matches!(events.last(), Some(ClientEvent::Done)));
    }

    #[tokio::test]
    async fn tool_call_iteration_dispatches_and_loops() {
        let (engine, sessions) = build_engine(vec![
            vec![
                ChatEvent::ToolCall {
                    call_id: "call-1".to_string(),
                    name: "echo".to_string(),
                    args: json!({"text": "ping"}),
                },
                ChatEvent::Done,
            ],
            vec![
                ChatEvent::Token { content: "done talking".to_string() },
                ChatEvent::Done,
            ],
        ])
        .await;
        let session = sessions.create_session("u1", "c1", "t").await.unwrap();
        let sink = Arc::new(RecordingSink::new());
        let identity = TurnIdentity { user_id: "u1".to_string(), company_id: "c1".to_string() };

        engine
            .process_turn(&session.id, &identity, "hi", sink.clone(), CancellationToken::new())
            .await
            .unwrap();

        let page = sessions.list_messages(&session.id, "c1", 10, 0).await.unwrap();
        let has_tool_result = page.messages.iter().any(|m| matches!(m.message, Message::ToolResult { .. }));
        assert!(has_tool_result);
    }

    #[tokio::test]
    async fn reentrant_call_on_same_session_is_rejected() {
        let (engine, sessions) = build_engine(vec![vec![ChatEvent::Done]]).await;
        let session = sessions.create_session("u1", "c1", "t").await.unwrap();
        let identity = TurnIdentity { user_id: "u1".to_string(), company_id: "c1".to_string() };
        engine.processing.insert(session.id.clone());
        let sink = Arc::new(RecordingSink::new());
        let err = engine.process_turn(&session.id, &identity, "hi", sink, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyProcessing(_)));
    }

    #[test]
    fn sliding_window_keeps_all_when_under_budget() {
        let msgs = vec![
            Message::System { content: "sys".into() },
            Message::User { content: "hi".into() },
        ];
        let windowed = apply_sliding_window(&msgs, &msgs[1], 6);
        assert_eq!(windowed.len(), 2);
    }

    #[test]
    fn sliding_window_trims_over_budget() {
        let mut msgs = vec![Message::System { content: "sys".into() }];
        for i in 0..10 {
            msgs.push(Message::User { content: format!("m{i}") });
        }
        let original = msgs[1].clone();
        let windowed = apply_sliding_window(&msgs, &original, 6);
        assert_eq!(windowed.len(), 6);
        assert!(matches!(windowed[0], Message::System { .. }));
        assert_eq!(windowed[1], original);
    }
}
