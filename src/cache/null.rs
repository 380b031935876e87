//! Null Backend
//!
//! Caches nothing. Used when the persistent backend cannot run on this
//! system, so every request falls through to the resolvers.

use async_trait::async_trait;

use crate::cache::{CacheBackend, Lookup, StorageSummary};
use crate::error::Result;

/// Backend that always misses and accepts every write without keeping it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl NullCache {
    /// Creates the null backend.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    fn kind(&self) -> &'static str {
        "null"
    }

    async fn lookup(&self, _resolver: &str, _authority: &str) -> Result<Lookup> {
        Ok(Lookup::Miss)
    }

    async fn store(
        &self,
        _resolver: &str,
        _authority: &str,
        _mime: Option<&str>,
        _data: Option<&[u8]>,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn summary(&self) -> Result<StorageSummary> {
        Ok(StorageSummary::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_cache_never_hits() {
        let cache = NullCache::new();

        let stored = cache
            .store("resolverX", "a.example", Some("image/png"), Some(b"PNGDATA"))
            .await
            .unwrap();
        assert!(stored);
        assert_eq!(
            cache.lookup("resolverX", "a.example").await.unwrap(),
            Lookup::Miss
        );
        assert_eq!(cache.summary().await.unwrap(), StorageSummary::default());
    }

    #[tokio::test]
    async fn test_null_cache_accepts_contract_violations() {
        let cache = NullCache::new();
        assert!(cache
            .store("resolverX", "a.example", None, Some(b"PNGDATA"))
            .await
            .unwrap());
        assert_eq!(cache.maintenance(true).await.unwrap(), None);
    }
}
