//! HTTP + WebSocket server for the orchestration core (axum).
//!
//! Exposes the session/prompt/specialist/http-tool/knowledge REST surface
//! plus one WebSocket endpoint per session (`GET /sessions/:id/ws`) that
//! drives the `OrchestrationEngine` dispatch loop (spec §4, §6).
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod auth;
mod connection;
mod error;
mod http_tool;
mod routes;

pub use auth::AuthContext;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_openai::config::OpenAIConfig;
use async_openai::Client as OpenAiClient;
use dashmap::DashMap;
use orchestrator_core::knowledge::{InMemoryKnowledgeStore, SqliteKnowledgeStore};
use orchestrator_core::tools::file::{
    ApplyPatchTool, CreateDirTool, DeleteFileTool, GlobTool, GrepTool, ListDirectoryTool, MoveFileTool,
    MultieditTool, ReadFileTool, WriteFileTool,
};
use orchestrator_core::tools::knowledge::{FindKnowledgeTool, StoreKnowledgeTool};
use orchestrator_core::tools::todo::{TodoReadTool, TodoWriteTool};
use orchestrator_core::tools::BashTool;
use orchestrator_core::{
    ChatStreamer, EngineBounds, InMemoryPromptStore, InMemorySessionStore, KnowledgeStore, OpenAiChatStreamer,
    OrchestrationEngine, PromptStore, SessionStore, SqlitePromptStore, SqliteSessionStore, ToolRegistry,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

use app::{router, AppState};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Builds the `ToolRegistry` with every built-in tool (spec §5): filesystem,
/// bash, todo, and knowledge tools, all rooted at `working_folder`.
///
/// `allowed_roots` is `EngineConfig::allowed_filesystem_roots` (spec §4.2(b)):
/// when non-empty, every filesystem tool additionally rejects paths that
/// resolve outside these roots, on top of the `working_folder` bound.
async fn build_tool_registry(
    working_folder: Arc<PathBuf>,
    allowed_roots: Arc<Vec<PathBuf>>,
    knowledge: Arc<dyn KnowledgeStore>,
) -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    let _ = registry.register(Arc::new(BashTool::new(working_folder.clone()))).await;
    let _ = registry
        .register(Arc::new(ReadFileTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(WriteFileTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(MultieditTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(ApplyPatchTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(DeleteFileTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(MoveFileTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(CreateDirTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(ListDirectoryTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(GlobTool::with_allowed_roots(working_folder.clone(), allowed_roots.clone())))
        .await;
    let _ = registry
        .register(Arc::new(GrepTool::with_allowed_roots(working_folder.clone(), allowed_roots)))
        .await;
    let _ = registry.register(Arc::new(TodoReadTool::new())).await;
    let _ = registry.register(Arc::new(TodoWriteTool::new())).await;
    let _ = registry.register(Arc::new(FindKnowledgeTool::new(knowledge.clone()))).await;
    let _ = registry.register(Arc::new(StoreKnowledgeTool::new(knowledge))).await;
    registry
}

fn chat_streamer_from_env() -> Arc<dyn ChatStreamer> {
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let config = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => OpenAIConfig::new().with_api_key(key),
        Err(_) => OpenAIConfig::new(),
    };
    let client = OpenAiClient::with_config(config);
    Arc::new(OpenAiChatStreamer::new(client, model))
}

/// Chooses in-memory or SQLite-backed stores based on env vars, mirroring
/// the `*_DB`-env-var pattern for opting individual stores into persistence.
fn build_stores() -> (Arc<dyn SessionStore>, Arc<dyn PromptStore>, Arc<dyn KnowledgeStore>) {
    let sessions: Arc<dyn SessionStore> = match std::env::var("SESSION_DB") {
        Ok(path) => match SqliteSessionStore::open(&path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "failed to open session db, falling back to in-memory");
                Arc::new(InMemorySessionStore::new())
            }
        },
        Err(_) => Arc::new(InMemorySessionStore::new()),
    };
    let prompts: Arc<dyn PromptStore> = match std::env::var("PROMPT_DB") {
        Ok(path) => match SqlitePromptStore::open(&path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "failed to open prompt db, falling back to in-memory");
                Arc::new(InMemoryPromptStore::new())
            }
        },
        Err(_) => Arc::new(InMemoryPromptStore::new()),
    };
    let knowledge: Arc<dyn KnowledgeStore> = match std::env::var("KNOWLEDGE_DB") {
        Ok(path) => match SqliteKnowledgeStore::open(&path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "failed to open knowledge db, falling back to in-memory");
                Arc::new(InMemoryKnowledgeStore::new())
            }
        },
        Err(_) => Arc::new(InMemoryKnowledgeStore::new()),
    };
    (sessions, prompts, knowledge)
}

/// Runs the server on an existing listener. Used by tests (bind to
/// 127.0.0.1:0, then pass the listener in). When `once` is true, accepts one
/// connection, handles it, then returns.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    once: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("server listening on http://{}", addr);
    if once {
        info!("will exit after first WebSocket connection is done (once mode, used by tests)");
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let working_folder = Arc::new(
        std::env::var("WORKING_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
    );
    let (sessions, prompts, knowledge) = build_stores();
    let engine_config = env_config::EngineConfig::from_env();
    let allowed_roots = Arc::new(engine_config.allowed_filesystem_roots.clone().unwrap_or_default());
    let tools = build_tool_registry(working_folder, allowed_roots, knowledge.clone()).await;
    let chat_streamer = chat_streamer_from_env();
    let bounds = EngineBounds::from(&engine_config);
    let engine = Arc::new(OrchestrationEngine::new(
        sessions.clone(),
        prompts.clone(),
        tools.clone(),
        chat_streamer,
        bounds,
    ));

    let state = Arc::new(AppState {
        shutdown_tx: Mutex::new(if once { Some(shutdown_tx) } else { None }),
        engine,
        sessions,
        prompts,
        knowledge,
        tools,
        http_tools: DashMap::new(),
        http_client: reqwest::Client::new(),
    });

    let app = router(state);

    if once {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await?;
        info!("connection done, exiting (once mode)");
    } else {
        axum::serve(listener, app).await?;
    }
    Ok(())
}

/// Runs the server. Listens on `addr` (default `127.0.0.1:8080`). When
/// `once` is true, accepts one WebSocket connection, handles it, then
/// returns (process exits).
pub async fn run_serve(
    addr: Option<&str>,
    once: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, once).await
}
