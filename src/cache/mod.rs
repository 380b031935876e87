//! Cache Module
//!
//! Content-addressed favicon cache with SQLite, in-memory and null backends.
//!
//! A cached resolution is keyed by `(resolver, authority)` and points at a
//! SHA-256 content digest; identical icons are stored once. A reserved
//! digest records that a resolver found no icon at all.

mod entry;
mod factory;
mod memory;
mod null;
mod sqlite;
mod stats;
mod store;


// Re-export public types
pub use entry::{admit, current_timestamp_secs, sha256_hex, Admitted, Lookup, SENTINEL_DIGEST};
pub use factory::build_cache;
pub use memory::MemoryCache;
pub use null::NullCache;
pub use sqlite::{SqliteCache, DB_SCHEMA, MIN_SQLITE_VERSION};
pub use stats::{CacheStats, MaintenanceReport, StatsCounters, StorageSummary};
pub use store::{CacheBackend, FaviconCache};
