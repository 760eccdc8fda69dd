//! Knowledge-store browsing REST surface (spec §6.2); the engine's
//! `knowledge_find`/`knowledge_store` tools hit the same [`KnowledgeStore`]
//! directly rather than through HTTP.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct QueryBody {
    pub collection: String,
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    5
}

pub(crate) async fn query(
    State(state): State<Arc<AppState>>,
    _auth: AuthContext,
    Json(body): Json<QueryBody>,
) -> Result<Json<Value>, ApiError> {
    let entries = state
        .knowledge
        .find(&body.collection, &body.query, body.limit.min(20))
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(entries)))
}

#[derive(Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_popular_limit")]
    pub limit: usize,
}

fn default_popular_limit() -> usize {
    20
}

pub(crate) async fn popular_collections(
    State(state): State<Arc<AppState>>,
    _auth: AuthContext,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let collections = state.knowledge.popular(q.limit).await.map_err(ApiError::from_err)?;
    Ok(Json(json!(collections
        .into_iter()
        .map(|(name, count)| json!({ "collection": name, "count": count }))
        .collect::<Vec<_>>())))
}

pub(crate) async fn collections(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    // No dedicated "all collections" store method exists; the popular-ranked
    // list with a high limit stands in for the full collection index.
    popular_collections(State(state), auth, Query(LimitQuery { limit: 1000 })).await
}

#[derive(Deserialize)]
pub struct BrowseQuery {
    pub collection: String,
    #[serde(default = "default_browse_limit")]
    pub limit: usize,
}

fn default_browse_limit() -> usize {
    50
}

pub(crate) async fn browse(
    State(state): State<Arc<AppState>>,
    _auth: AuthContext,
    Query(q): Query<BrowseQuery>,
) -> Result<Json<Value>, ApiError> {
    let entries = state
        .knowledge
        .list(&q.collection, q.limit)
        .await
        .map_err(ApiError::from_err)?;
    Ok(Json(json!(entries)))
}
