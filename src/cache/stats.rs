//! Cache Statistics Module
//!
//! Tracks lookup and store outcomes, plus the reports produced by the
//! storage backends.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned cached icon bytes
    pub positive_hits: u64,
    /// Lookups that returned a cached "no icon" result
    pub negative_hits: u64,
    /// Lookups with no cached resolution
    pub misses: u64,
    /// Successful stores
    pub stores: u64,
    /// Stores refused by policy (missing mime type, oversize)
    pub rejected_stores: u64,
    /// Stores that failed in the backend
    pub store_errors: u64,
    /// Lookups that failed in the backend
    pub lookup_errors: u64,
    /// Maintenance sweeps that actually ran
    pub maintenance_runs: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate, counting negative hits as hits.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.positive_hits + self.negative_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters shared by all clones of a cache handle.
#[derive(Debug, Default)]
pub struct StatsCounters {
    positive_hits: AtomicU64,
    negative_hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    rejected_stores: AtomicU64,
    store_errors: AtomicU64,
    lookup_errors: AtomicU64,
    maintenance_runs: AtomicU64,
}

impl StatsCounters {
    /// Creates counters starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a lookup served with icon bytes.
    pub fn record_positive_hit(&self) {
        self.positive_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a lookup served with a cached "no icon".
    pub fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a lookup with nothing cached.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a write the backend accepted.
    pub fn record_store(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a write refused by the store policy.
    pub fn record_rejected_store(&self) {
        self.rejected_stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a write the backend failed on.
    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a lookup the backend failed on.
    pub fn record_lookup_error(&self) {
        self.lookup_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a maintenance sweep that ran.
    pub fn record_maintenance_run(&self) {
        self.maintenance_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            positive_hits: self.positive_hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            rejected_stores: self.rejected_stores.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            lookup_errors: self.lookup_errors.load(Ordering::Relaxed),
            maintenance_runs: self.maintenance_runs.load(Ordering::Relaxed),
        }
    }
}

// == Storage Summary ==
/// Size of the data held by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageSummary {
    /// Distinct blobs (deduplicated by digest)
    pub blob_count: u64,
    /// `(resolver, authority)` mapping entries, negative ones included
    pub mapping_count: u64,
    /// Sum of all blob sizes
    pub total_bytes: u64,
}

// == Maintenance Report ==
/// Outcome of one maintenance sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Mapping entries older than the hold time
    pub expired_mappings: u64,
    /// Blobs left without any mapping entry
    pub orphaned_blobs: u64,
    /// Blobs dropped to get under the total byte limit
    pub evicted_blobs: u64,
    /// Bytes freed by the size-based eviction
    pub evicted_bytes: u64,
    /// Blob bytes after the age-based steps, before size eviction
    pub total_bytes_before: u64,
    /// Blob bytes when the sweep finished
    pub total_bytes_after: u64,
}
