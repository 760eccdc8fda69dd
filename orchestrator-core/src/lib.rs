//! # orchestrator-core
//!
//! The agentic coordinator subsystem: a tool registry/execution fabric, a
//! durable session and prompt layer, a knowledge store with optional vector
//! search, and the streaming dispatch loop (`OrchestrationEngine`) that ties
//! them together with a provider-agnostic `ChatStreamer`.
//!
//! ## Main modules
//!
//! - [`tool_source`]: [`tool_source::ToolRegistry`] (name → executor map,
//!   stable ordering, schema validation, per-call deadlines),
//!   [`tool_source::RemoteToolClient`] (stdio JSON-RPC multiplexer for
//!   out-of-process tool sources), [`tool_source::ToolCallContext`].
//! - [`tools`]: built-in [`tools::Tool`] executors — filesystem (`read_file`,
//!   `write_file`, `apply_patch`, `multiedit`, `list_directory`, `glob`,
//!   `grep`, `create_dir`, `delete_file`, `move_file`), `bash`, todo-list
//!   bookkeeping, and knowledge lookup/store.
//! - [`session`]: [`session::SessionStore`] — durable per-session message
//!   history, in-memory and SQLite implementations.
//! - [`prompt`]: [`prompt::PromptStore`] — global system prompt, Specialists
//!   ("subagents"), and versioned prompts, in-memory and SQLite
//!   implementations.
//! - [`knowledge`]: [`knowledge::KnowledgeStore`] — durable notes with
//!   optional embedding-backed semantic search, in-memory and SQLite
//!   (`sqlite-vec`) implementations.
//! - [`chat`]: [`chat::ChatStreamer`] — provider-agnostic streaming chat
//!   adapter; [`chat::OpenAiChatStreamer`] is the production implementation.
//! - [`engine`]: [`engine::OrchestrationEngine`] — the dispatch loop.
//! - [`message`]: [`message::Message`] — the five-role neutral message shape
//!   shared by `SessionStore`, `ChatStreamer`, and the engine.
//! - [`error`]: the shared [`error::ErrorKind`] taxonomy every component error
//!   enum maps onto via [`error::HasErrorKind`].

pub mod chat;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod message;
pub mod prompt;
pub mod session;
pub mod tool_source;
pub mod tools;

pub use chat::{ChatEvent, ChatStreamer, ChatStreamerError, OpenAiChatStreamer};
pub use engine::{EngineBounds, EngineError, EventSink, OrchestrationEngine, TurnIdentity};
pub use error::{ErrorKind, HasErrorKind};
pub use knowledge::{KnowledgeEntry, KnowledgeStore, KnowledgeStoreError};
pub use message::Message;
pub use prompt::{InMemoryPromptStore, PromptStore, PromptStoreError, Specialist, SqlitePromptStore};
pub use session::{InMemorySessionStore, Session, SessionStore, SessionStoreError, SqliteSessionStore};
pub use tool_source::{
    RemoteToolClient, RemoteToolClientError, ToolCallContent, ToolCallContext, ToolRegistry,
    ToolRegistryError, ToolSourceError, ToolSpec,
};
pub use tools::Tool;

/// Initializes tracing from `RUST_LOG` so unit tests across the workspace can
/// print logs with `--nocapture`, matching the teacher's `test_logging` setup.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
