//! Response DTOs for the operational API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, MaintenanceReport, StorageSummary};

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active backend ("sqlite", "mem" or "null")
    pub backend: String,
    /// Lookup and store counters since startup
    #[serde(flatten)]
    pub counters: CacheStats,
    /// Hit rate ((positive + negative hits) / lookups)
    pub hit_rate: f64,
    /// Distinct blobs stored
    pub blob_count: u64,
    /// Mapping entries, negative ones included
    pub mapping_count: u64,
    /// Sum of stored blob sizes
    pub total_bytes: u64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from the cache counters and storage summary
    pub fn new(backend: impl Into<String>, counters: CacheStats, summary: StorageSummary) -> Self {
        Self {
            backend: backend.into(),
            hit_rate: counters.hit_rate(),
            counters,
            blob_count: summary.blob_count,
            mapping_count: summary.mapping_count,
            total_bytes: summary.total_bytes,
        }
    }
}

/// Response body for POST /maintenance
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceResponse {
    /// Whether a sweep actually ran
    pub ran: bool,
    #[serde(flatten)]
    pub report: Option<MaintenanceReport>,
}

impl MaintenanceResponse {
    pub fn new(report: Option<MaintenanceReport>) -> Self {
        Self {
            ran: report.is_some(),
            report,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
