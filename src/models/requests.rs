//! Request DTOs for the operational API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for POST /maintenance
///
/// An empty object (or no body at all) runs maintenance only if it is due.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MaintenanceRequest {
    /// Run the sweep even if the maintenance period has not elapsed
    #[serde(default)]
    pub force: bool,
}
