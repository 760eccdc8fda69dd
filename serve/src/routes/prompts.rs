//! System prompt and prompt-version REST surface (spec §6.2).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;

pub(crate) async fn get_system_prompt(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let text = state
        .prompts
        .get_system_prompt(&auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "text": text })))
}

#[derive(Deserialize)]
pub struct SystemPromptBody {
    pub text: String,
}

pub(crate) async fn put_system_prompt(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<SystemPromptBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .prompts
        .upsert_system_prompt(&auth.user_id, &auth.company_id, &body.text)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "ok": true })))
}

pub(crate) async fn get_default_version(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let versions = state
        .prompts
        .list_versions(&auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    let default = versions.into_iter().find(|v| v.label == "default");
    Ok(Json(json!(default)))
}

pub(crate) async fn list_versions(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let versions = state
        .prompts
        .list_versions(&auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(versions)))
}

#[derive(Deserialize)]
pub struct CreateVersionBody {
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub activate: bool,
}

pub(crate) async fn create_version(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<CreateVersionBody>,
) -> Result<Json<Value>, ApiError> {
    let version = state
        .prompts
        .create_version(&auth.user_id, &auth.company_id, &body.label, &body.text, body.activate)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(version)))
}

pub(crate) async fn get_version(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let version = state
        .prompts
        .get_version(&id, &auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(version)))
}

pub(crate) async fn delete_version(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .prompts
        .delete_version(&id, &auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "deleted": true })))
}

pub(crate) async fn activate_version(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .prompts
        .activate_version(&id, &auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "ok": true })))
}
