//! API Module
//!
//! HTTP handlers and routing for the operational API of the favicon cache.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache counters and storage size
//! - `POST /maintenance` - Run a maintenance sweep
//! - `GET /entries/:resolver/:authority` - Inspect a cached favicon

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
