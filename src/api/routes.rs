//! API Routes
//!
//! Configures the Axum router with the operational endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    entry_handler, health_handler, maintenance_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Cache counters and storage size
/// - `POST /maintenance` - Run a maintenance sweep
/// - `GET /entries/:resolver/:authority` - Inspect a cached favicon
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/maintenance", post(maintenance_handler))
        .route("/entries/:resolver/:authority", get(entry_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
