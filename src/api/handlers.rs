//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::adapter::CacheAdapter;
use crate::error::Result;
use crate::manager::CacheManager;
use crate::models::{
    DeleteMultipleRequest, ExistsResponse, GetMultipleRequest, GetResponse, HealthResponse,
    OkResponse, SetMultipleRequest, SetRequest, ValuesResponse,
};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub manager: CacheManager,
}

impl AppState {
    pub fn new(manager: CacheManager) -> Self {
        Self { manager }
    }

    /// Wraps a single adapter.
    pub fn with_adapter(adapter: Arc<dyn CacheAdapter>) -> Self {
        Self::new(CacheManager::new(adapter))
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.manager.adapter().name()))
}

/// Handler for GET /cache/:key
///
/// A miss answers 200 with a null value.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state.manager.get(&key, Value::Null).await?;
    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for GET /cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>> {
    let exists = state.manager.has(&key).await?;
    Ok(Json(ExistsResponse::new(key, exists)))
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<OkResponse>> {
    let key = req.key()?;
    let ttl = req.ttl()?;
    let ok = state.manager.set(key, req.value.clone(), ttl).await?;
    Ok(Json(OkResponse::new(ok)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<OkResponse>> {
    let ok = state.manager.delete(&key).await?;
    Ok(Json(OkResponse::new(ok)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<OkResponse>> {
    let ok = state.manager.clear().await?;
    Ok(Json(OkResponse::new(ok)))
}

/// Handler for POST /cache/mget
pub async fn get_multiple_handler(
    State(state): State<AppState>,
    Json(req): Json<GetMultipleRequest>,
) -> Result<Json<ValuesResponse>> {
    let keys = req.keys()?;
    let values = state
        .manager
        .get_multiple(&keys, req.default.clone())
        .await?;
    Ok(Json(ValuesResponse::new(values)))
}

/// Handler for POST /cache/mset
pub async fn set_multiple_handler(
    State(state): State<AppState>,
    Json(req): Json<SetMultipleRequest>,
) -> Result<Json<OkResponse>> {
    let ttl = req.ttl()?;
    let values = req.into_values()?;
    let ok = state.manager.set_multiple(values, ttl).await?;
    Ok(Json(OkResponse::new(ok)))
}

/// Handler for POST /cache/mdel
pub async fn delete_multiple_handler(
    State(state): State<AppState>,
    Json(req): Json<DeleteMultipleRequest>,
) -> Result<Json<OkResponse>> {
    let keys = req.keys()?;
    let ok = state.manager.delete_multiple(&keys).await?;
    Ok(Json(OkResponse::new(ok)))
}
