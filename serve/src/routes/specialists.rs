//! Specialist ("subagent") CRUD REST surface (spec §6.2).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateSpecialistBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "systemPrompt", default)]
    pub system_prompt: String,
}

pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<CreateSpecialistBody>,
) -> Result<Json<Value>, ApiError> {
    let specialist = state
        .prompts
        .create_specialist(&auth.user_id, &auth.company_id, &body.name, &body.description, &body.system_prompt)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(specialist)))
}

pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let specialists = state
        .prompts
        .list_specialists(&auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(specialists)))
}

pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let specialist = state
        .prompts
        .get_specialist(&id, &auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(specialist)))
}

#[derive(Deserialize)]
pub struct UpdateSpecialistBody {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: Option<String>,
}

pub(crate) async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateSpecialistBody>,
) -> Result<Json<Value>, ApiError> {
    let specialist = state
        .prompts
        .update_specialist(
            &id,
            &auth.user_id,
            &auth.company_id,
            body.name.as_deref(),
            body.description.as_deref(),
            body.system_prompt.as_deref(),
        )
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(specialist)))
}

pub(crate) async fn delete_one(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .prompts
        .delete_specialist(&id, &auth.user_id, &auth.company_id)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!({ "deleted": true })))
}
