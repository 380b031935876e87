//! Cache Maintenance Task
//!
//! Background task that periodically runs the cache maintenance sweep
//! instead of piggybacking on writes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::FaviconCache;

/// Spawns a background task that runs cache maintenance every
/// `interval_secs` seconds.
///
/// Each run only does work when the backend says maintenance is due. A sweep
/// is due from one full period after the previous one, so waking once per
/// maintenance period sweeps once per period. Failures are logged and the
/// loop keeps going.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = build_cache(&config).await?;
/// let handle = spawn_maintenance_task(cache.clone(), config.maintenance_period);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task(cache: FaviconCache, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting favicon cache maintenance task ({}) with interval of {} seconds",
            cache.backend_kind(),
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.maintenance(false).await {
                Ok(Some(report)) => info!(
                    "favicon cache maintenance: {} expired, {} orphaned, {} evicted ({} bytes)",
                    report.expired_mappings,
                    report.orphaned_blobs,
                    report.evicted_blobs,
                    report.evicted_bytes
                ),
                Ok(None) => debug!("favicon cache maintenance: not due"),
                Err(e) => warn!("favicon cache maintenance failed: {}", e),
            }
        }
    })
}
