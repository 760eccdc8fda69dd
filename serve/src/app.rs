//! Axum app: shared state, router assembly, and the WebSocket upgrade handler.

use std::sync::{Arc, Mutex};

use axum::extract::{
    ws::WebSocketUpgrade, Path, State,
};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;
use dashmap::DashMap;
use orchestrator_core::{KnowledgeStore, OrchestrationEngine, PromptStore, SessionStore, ToolRegistry};
use tokio::sync::oneshot;

use crate::connection::handle_socket;
use crate::http_tool::HttpToolDefinition;
use crate::{routes, AuthContext};

/// When set, the first WebSocket connection to close sends on this to signal
/// server exit (`once` mode, used by tests).
pub(crate) struct AppState {
    pub(crate) shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    pub(crate) engine: Arc<OrchestrationEngine>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) prompts: Arc<dyn PromptStore>,
    pub(crate) knowledge: Arc<dyn KnowledgeStore>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) http_tools: DashMap<String, HttpToolDefinition>,
    pub(crate) http_client: reqwest::Client,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sessions/:id/ws", get(ws_handler))
        .route("/sessions", post(routes::sessions::create).get(routes::sessions::list))
        .route(
            "/sessions/:id",
            get(routes::sessions::get_one).delete(routes::sessions::delete_one),
        )
        .route("/sessions/:id/messages", get(routes::sessions::messages))
        .route("/sessions/:id/subagent", put(routes::sessions::set_subagent))
        .route(
            "/system-prompt",
            get(routes::prompts::get_system_prompt).put(routes::prompts::put_system_prompt),
        )
        .route("/system-prompt/default", get(routes::prompts::get_default_version))
        .route(
            "/system-prompt/versions",
            get(routes::prompts::list_versions).post(routes::prompts::create_version),
        )
        .route(
            "/system-prompt/versions/:id",
            get(routes::prompts::get_version).delete(routes::prompts::delete_version),
        )
        .route(
            "/system-prompt/versions/:id/activate",
            put(routes::prompts::activate_version),
        )
        .route(
            "/subagents",
            get(routes::specialists::list).post(routes::specialists::create),
        )
        .route(
            "/subagents/:id",
            get(routes::specialists::get_one)
                .put(routes::specialists::update)
                .delete(routes::specialists::delete_one),
        )
        .route("/tools", get(routes::tools_http::list_all))
        .route(
            "/tools/http",
            get(routes::tools_http::list).post(routes::tools_http::create),
        )
        .route(
            "/tools/http/:id",
            get(routes::tools_http::get_one).delete(routes::tools_http::delete_one),
        )
        .route("/knowledge/query", post(routes::knowledge::query))
        .route("/knowledge/collections", get(routes::knowledge::collections))
        .route(
            "/knowledge/popular-collections",
            get(routes::knowledge::popular_collections),
        )
        .route("/knowledge/browse", get(routes::knowledge::browse))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
) -> Response {
    let shutdown_tx = state.shutdown_tx.lock().ok().and_then(|mut g| g.take());
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, auth, state, shutdown_tx))
}
