//! API Handlers
//!
//! HTTP request handlers for the operational endpoints of the favicon cache.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::{FaviconCache, Lookup};
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, MaintenanceRequest, MaintenanceResponse, StatsResponse};

/// Application state shared across all handlers.
///
/// The cache handle is cheap to clone and internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub cache: FaviconCache,
}

impl AppState {
    /// Creates a new AppState around the given cache handle.
    pub fn new(cache: FaviconCache) -> Self {
        Self { cache }
    }
}

/// Handler for GET /entries/:resolver/:authority
///
/// Returns the cached icon with its mime type, `204 No Content` for a cached
/// "no icon" result, and `404` when nothing is cached.
pub async fn entry_handler(
    State(state): State<AppState>,
    Path((resolver, authority)): Path<(String, String)>,
) -> Result<Response> {
    match state.cache.lookup(&resolver, &authority).await {
        Lookup::PositiveHit { data, mime } => {
            Ok(([(header::CONTENT_TYPE, mime)], data).into_response())
        }
        Lookup::NegativeHit => Ok(StatusCode::NO_CONTENT.into_response()),
        Lookup::Miss => Err(CacheError::NotFound(format!("{}/{}", resolver, authority))),
    }
}

/// Handler for POST /maintenance
///
/// Runs a maintenance sweep if due, or unconditionally with `{"force": true}`.
pub async fn maintenance_handler(
    State(state): State<AppState>,
    body: Option<Json<MaintenanceRequest>>,
) -> Result<Json<MaintenanceResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let report = state.cache.maintenance(req.force).await?;

    Ok(Json(MaintenanceResponse::new(report)))
}

/// Handler for GET /stats
///
/// Returns lookup counters and the current storage size.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let summary = state.cache.summary().await?;

    Ok(Json(StatsResponse::new(
        state.cache.backend_kind(),
        state.cache.stats(),
        summary,
    )))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
