//! Sessions REST surface (spec §6.2).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub title: String,
}

pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<Value>, ApiError> {
    let title = if body.title.is_empty() { "Untitled session".to_string() } else { body.title };
    let session = state
        .sessions
        .create_session(&auth.user_id, &auth.company_id, &title)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(session)))
}

pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let sessions = state
        .sessions
        .list_sessions(&auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(sessions)))
}

pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .sessions
        .get_session(&id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(session)))
}

pub(crate) async fn delete_one(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .sessions
        .delete_session(&id, &auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

pub(crate) async fn messages(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = state
        .sessions
        .list_messages(&id, &auth.company_id, q.limit, q.offset)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(page)))
}

#[derive(Deserialize)]
pub struct SetSubagentBody {
    #[serde(rename = "subagentId")]
    pub subagent_id: Option<String>,
}

pub(crate) async fn set_subagent(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<SetSubagentBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .sessions
        .set_active_specialist(&id, &auth.company_id, body.subagent_id.as_deref())
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "ok": true })))
}
