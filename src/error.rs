//! Error types for the favicon cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the favicon cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid or unsupported configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persistent backend cannot run on this system
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The database was created by an incompatible schema version
    #[error("Expected DB schema v{expected}, DB schema is v{found}")]
    SchemaMismatch { expected: i64, found: String },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No cache entry for the requested key
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Failure reported by the storage engine
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (config file, database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Config(_)
            | CacheError::SchemaMismatch { .. }
            | CacheError::Database(_)
            | CacheError::Io(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the favicon cache.
pub type Result<T> = std::result::Result<T, CacheError>;
