//! In-Memory Backend
//!
//! Keeps favicons in the memory of the process. Nothing is ever evicted, so
//! this is only suitable for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{admit, Admitted, CacheBackend, Lookup, StorageSummary, SENTINEL_DIGEST};
use crate::error::Result;

#[derive(Debug, Default)]
struct MemoryInner {
    /// digest -> content
    blobs: HashMap<String, Vec<u8>>,
    /// (resolver, authority) -> (digest, mime)
    mappings: HashMap<(String, String), (String, Option<String>)>,
}

// == Memory Cache ==
/// Unbounded, process-local favicon cache.
#[derive(Debug)]
pub struct MemoryCache {
    blob_max_bytes: u64,
    inner: RwLock<MemoryInner>,
}

impl MemoryCache {
    /// Creates an empty cache refusing blobs larger than `blob_max_bytes`.
    pub fn new(blob_max_bytes: u64) -> Self {
        Self {
            blob_max_bytes,
            inner: RwLock::new(MemoryInner::default()),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn kind(&self) -> &'static str {
        "mem"
    }

    async fn lookup(&self, resolver: &str, authority: &str) -> Result<Lookup> {
        let inner = self.inner.read().await;
        let key = (resolver.to_string(), authority.to_string());

        let Some((digest, mime)) = inner.mappings.get(&key) else {
            return Ok(Lookup::Miss);
        };
        if digest == SENTINEL_DIGEST {
            return Ok(Lookup::NegativeHit);
        }

        match (inner.blobs.get(digest), mime) {
            (Some(data), Some(mime)) => Ok(Lookup::PositiveHit {
                data: data.clone(),
                mime: mime.clone(),
            }),
            _ => Ok(Lookup::Miss),
        }
    }

    async fn store(
        &self,
        resolver: &str,
        authority: &str,
        mime: Option<&str>,
        data: Option<&[u8]>,
    ) -> Result<bool> {
        let Some(admitted) = admit(resolver, authority, mime, data, self.blob_max_bytes) else {
            return Ok(false);
        };

        let mut inner = self.inner.write().await;
        let key = (resolver.to_string(), authority.to_string());
        match admitted {
            Admitted::Negative => {
                inner
                    .mappings
                    .insert(key, (SENTINEL_DIGEST.to_string(), None));
            }
            Admitted::Blob { digest, mime, data } => {
                inner
                    .blobs
                    .entry(digest.clone())
                    .or_insert_with(|| data.to_vec());
                inner.mappings.insert(key, (digest, Some(mime.to_string())));
            }
        }
        Ok(true)
    }

    async fn summary(&self) -> Result<StorageSummary> {
        let inner = self.inner.read().await;
        Ok(StorageSummary {
            blob_count: inner.blobs.len() as u64,
            mapping_count: inner.mappings.len() as u64,
            total_bytes: inner.blobs.values().map(|b| b.len() as u64).sum(),
        })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_positive_roundtrip_and_miss() {
        let cache = MemoryCache::new(1024);

        assert!(cache
            .store("resolverX", "a.example", Some("image/png"), Some(b"PNGDATA"))
            .await
            .unwrap());

        assert_eq!(
            cache.lookup("resolverX", "a.example").await.unwrap(),
            Lookup::PositiveHit {
                data: b"PNGDATA".to_vec(),
                mime: "image/png".to_string(),
            }
        );
        assert_eq!(
            cache.lookup("resolverX", "b.example").await.unwrap(),
            Lookup::Miss
        );
    }

    #[tokio::test]
    async fn test_negative_entry_is_distinct_from_miss() {
        let cache = MemoryCache::new(1024);

        assert!(cache.store("r", "a.example", None, None).await.unwrap());
        assert_eq!(
            cache.lookup("r", "a.example").await.unwrap(),
            Lookup::NegativeHit
        );
        assert_eq!(cache.lookup("r", "b.example").await.unwrap(), Lookup::Miss);
        assert_eq!(cache.summary().await.unwrap().blob_count, 0);
    }

    #[tokio::test]
    async fn test_identical_content_is_deduplicated() {
        let cache = MemoryCache::new(1024);

        cache
            .store("r", "a.example", Some("image/png"), Some(b"SAME"))
            .await
            .unwrap();
        cache
            .store("r", "b.example", Some("image/png"), Some(b"SAME"))
            .await
            .unwrap();

        let summary = cache.summary().await.unwrap();
        assert_eq!(summary.blob_count, 1);
        assert_eq!(summary.mapping_count, 2);
        assert_eq!(summary.total_bytes, 4);
    }

    #[tokio::test]
    async fn test_rejected_writes_leave_no_trace() {
        let cache = MemoryCache::new(4);

        assert!(!cache
            .store("r", "a.example", None, Some(b"PNG"))
            .await
            .unwrap());
        assert!(!cache
            .store("r", "b.example", Some("image/png"), Some(b"TOO BIG"))
            .await
            .unwrap());

        assert_eq!(cache.summary().await.unwrap(), StorageSummary::default());
        assert_eq!(cache.lookup("r", "a.example").await.unwrap(), Lookup::Miss);
        assert_eq!(cache.lookup("r", "b.example").await.unwrap(), Lookup::Miss);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_resolution() {
        let cache = MemoryCache::new(1024);

        cache
            .store("r", "a.example", Some("image/png"), Some(b"OLD"))
            .await
            .unwrap();
        cache.store("r", "a.example", None, None).await.unwrap();
        assert_eq!(
            cache.lookup("r", "a.example").await.unwrap(),
            Lookup::NegativeHit
        );

        cache
            .store("r", "a.example", Some("image/x-icon"), Some(b"NEW"))
            .await
            .unwrap();
        assert_eq!(
            cache.lookup("r", "a.example").await.unwrap(),
            Lookup::PositiveHit {
                data: b"NEW".to_vec(),
                mime: "image/x-icon".to_string(),
            }
        );
        assert_eq!(cache.summary().await.unwrap().mapping_count, 1);
    }
}
