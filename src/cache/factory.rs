//! Backend Factory
//!
//! Builds the one cache backend used for the lifetime of the process.

use tracing::{error, info};

use crate::cache::{FaviconCache, MemoryCache, NullCache, SqliteCache};
use crate::config::{BackendKind, Config};
use crate::error::{CacheError, Result};

/// Constructs the backend declared in `config`.
///
/// A persistent backend that cannot run on this system degrades to the
/// [`NullCache`]: icons are then never cached, but requests keep being served.
/// Any other failure to open the database is returned to the caller.
pub async fn build_cache(config: &Config) -> Result<FaviconCache> {
    match config.db_type {
        BackendKind::Sqlite => degrade_unavailable(SqliteCache::open(config).await),
        BackendKind::Memory => {
            error!("Favicons are cached in memory, don't use this in production!");
            let cache = MemoryCache::new(config.blob_max_bytes);
            info!("favicon cache backend: {}", BackendKind::Memory);
            Ok(FaviconCache::new(cache))
        }
    }
}

/// Turns an unusable SQLite library into a [`NullCache`]; every other open
/// error stays fatal.
fn degrade_unavailable(opened: Result<SqliteCache>) -> Result<FaviconCache> {
    match opened {
        Ok(cache) => Ok(FaviconCache::new(cache)),
        Err(CacheError::BackendUnavailable(reason)) => {
            error!("Disable favicon caching completely: {}", reason);
            Ok(FaviconCache::new(NullCache::new()))
        }
        Err(e) => Err(e),
    }
}
