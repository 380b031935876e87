//! Cache Store Module
//!
//! The backend capability shared by all storage engines and the
//! [`FaviconCache`] handle handed out to the rest of the process.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{CacheStats, Lookup, MaintenanceReport, StatsCounters, StorageSummary};
use crate::error::Result;

// == Cache Backend ==
/// Storage engine behind the favicon cache.
///
/// Every implementation applies the same store policy (see
/// [`crate::cache::admit`]): `Ok(false)` means the write was refused and
/// nothing was written, `Err` means the storage engine failed.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name of the backend, used in logs and stats.
    fn kind(&self) -> &'static str;

    /// Reads the cached resolution for `(resolver, authority)`.
    async fn lookup(&self, resolver: &str, authority: &str) -> Result<Lookup>;

    /// Records a resolution. `data = None` records a negative result.
    async fn store(
        &self,
        resolver: &str,
        authority: &str,
        mime: Option<&str>,
        data: Option<&[u8]>,
    ) -> Result<bool>;

    /// Runs a maintenance sweep if one is due (or `force` is set).
    ///
    /// Returns `None` when nothing ran. Backends without eviction never run.
    async fn maintenance(&self, _force: bool) -> Result<Option<MaintenanceReport>> {
        Ok(None)
    }

    /// Counts the stored blobs, mappings and bytes.
    async fn summary(&self) -> Result<StorageSummary>;
}

// == Favicon Cache ==
/// Handle to the one cache backend chosen at startup.
///
/// Cloning is cheap; all clones share the backend and the counters. Lookups
/// and stores never fail at this level: backend errors are logged and the
/// cache behaves as if nothing was cached.
#[derive(Clone)]
pub struct FaviconCache {
    backend: Arc<dyn CacheBackend>,
    stats: Arc<StatsCounters>,
}

impl FaviconCache {
    // == Constructor ==
    /// Wraps a backend.
    pub fn new<B: CacheBackend + 'static>(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Wraps an already shared backend.
    pub fn from_arc(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            stats: Arc::new(StatsCounters::new()),
        }
    }

    /// Name of the active backend.
    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    // == Lookup ==
    /// Looks up `(resolver, authority)`; a backend failure reads as a miss.
    pub async fn lookup(&self, resolver: &str, authority: &str) -> Lookup {
        match self.backend.lookup(resolver, authority).await {
            Ok(lookup) => {
                match &lookup {
                    Lookup::PositiveHit { .. } => self.stats.record_positive_hit(),
                    Lookup::NegativeHit => self.stats.record_negative_hit(),
                    Lookup::Miss => self.stats.record_miss(),
                }
                lookup
            }
            Err(e) => {
                warn!(
                    "favicon cache lookup failed for {} / {}: {}",
                    resolver, authority, e
                );
                self.stats.record_lookup_error();
                self.stats.record_miss();
                Lookup::Miss
            }
        }
    }

    // == Store ==
    /// Stores a resolution and reports whether it was cached.
    ///
    /// `false` means the caller has to resolve the icon again next time.
    pub async fn store(
        &self,
        resolver: &str,
        authority: &str,
        mime: Option<&str>,
        data: Option<&[u8]>,
    ) -> bool {
        match self.backend.store(resolver, authority, mime, data).await {
            Ok(true) => {
                self.stats.record_store();
                true
            }
            Ok(false) => {
                self.stats.record_rejected_store();
                false
            }
            Err(e) => {
                warn!(
                    "favicon cache store failed for {} / {}: {}",
                    resolver, authority, e
                );
                self.stats.record_store_error();
                false
            }
        }
    }

    // == Maintenance ==
    /// Runs maintenance on the backend, see [`CacheBackend::maintenance`].
    pub async fn maintenance(&self, force: bool) -> Result<Option<MaintenanceReport>> {
        let report = self.backend.maintenance(force).await?;
        if report.is_some() {
            self.stats.record_maintenance_run();
        } else {
            debug!("favicon cache maintenance skipped");
        }
        Ok(report)
    }

    /// Current size of the stored data.
    pub async fn summary(&self) -> Result<StorageSummary> {
        self.backend.summary().await
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
