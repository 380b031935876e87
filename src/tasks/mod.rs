//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance: evicts expired and excess favicons when the cache is
//!   configured for background maintenance

mod maintenance;

pub use maintenance::spawn_maintenance_task;
