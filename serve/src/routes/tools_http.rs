//! Custom HTTP tool CRUD REST surface (spec §6.2): registering a definition
//! here makes it immediately callable by the engine under its `name`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use orchestrator_core::ErrorKind;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::http_tool::{register_http_tool, HttpToolDefinition};

#[derive(Deserialize)]
pub struct CreateHttpToolBody {
    pub name: String,
    pub description: Option<String>,
    pub method: String,
    pub url: String,
    #[serde(rename = "inputSchema", default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<CreateHttpToolBody>,
) -> Result<Json<Value>, ApiError> {
    let def = HttpToolDefinition {
        id: Uuid::new_v4().to_string(),
        user_id: auth.user_id,
        company_id: auth.company_id,
        name: body.name,
        description: body.description,
        method: body.method,
        url: body.url,
        input_schema: body.input_schema,
    };
    register_http_tool(&state.tools, state.http_client.clone(), def.clone())
        .await
        .map_err(ApiError::from_err)?;
    state.http_tools.insert(def.id.clone(), def.clone());
    Ok(Json(json!(def)))
}

pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let defs: Vec<HttpToolDefinition> = state
        .http_tools
        .iter()
        .filter(|e| e.company_id == auth.company_id)
        .map(|e| e.value().clone())
        .collect();
    Ok(Json(json!(defs)))
}

/// `GET /tools`: every registered executor (built-in and custom HTTP), not
/// scoped by company since the registry itself isn't tenant-partitioned.
pub(crate) async fn list_all(State(state): State<Arc<AppState>>, _auth: AuthContext) -> Json<Value> {
    Json(json!(state.tools.describe_all().await))
}

pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let def = state
        .http_tools
        .get(&id)
        .filter(|e| e.company_id == auth.company_id)
        .map(|e| e.value().clone())
        .ok_or_else(|| ApiError::from_err(NotFound))?;
    Ok(Json(json!(def)))
}

pub(crate) async fn delete_one(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let def = state
        .http_tools
        .get(&id)
        .filter(|e| e.company_id == auth.company_id)
        .map(|e| e.value().clone())
        .ok_or_else(|| ApiError::from_err(NotFound))?;
    state.tools.unregister(&def.name).await;
    state.http_tools.remove(&id);
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, thiserror::Error)]
#[error("http tool not found")]
struct NotFound;

impl orchestrator_core::HasErrorKind for NotFound {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }
}
