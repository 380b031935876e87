//! Favicon Cache - persistent cache for resolved website favicons
//!
//! Stores icons per `(resolver, authority)` with content deduplication,
//! negative caching, and time and size bounded eviction.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod resolver;
pub mod tasks;

pub use api::AppState;
pub use cache::{build_cache, FaviconCache, Lookup};
pub use config::Config;
pub use error::{CacheError, Result};
pub use resolver::{Resolver, ResolverRegistry};
pub use tasks::spawn_maintenance_task;
