//! Resolver Dispatch
//!
//! Named favicon resolvers and the cache-first lookup flow in front of them.
//! The resolvers themselves (outbound HTTP to icon services) live outside
//! this crate; they only have to implement [`Resolver`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{FaviconCache, Lookup};
use crate::error::Result;

/// Icon bytes and mime type as returned by a resolver.
pub type Icon = (Vec<u8>, String);

// == Resolver ==
/// Strategy fetching the favicon of a domain.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves the icon of `authority`.
    ///
    /// `(None, None)` means the resolver found no icon. Resolvers bound
    /// their own network time before returning.
    async fn resolve(&self, authority: &str) -> Result<(Option<Vec<u8>>, Option<String>)>;
}

// == Resolver Registry ==
/// Fixed set of resolvers, keyed by the name stored in the cache.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resolver` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(name.into(), resolver);
    }

    /// Returns true if a resolver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    /// Sorted names of all registered resolvers.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Finds the favicon of `authority` with the resolver `name`.
    ///
    /// The cache is consulted first. On a miss the resolver is called and its
    /// result, an icon or a confirmed absence, is written back. Resolver errors
    /// and incomplete results (bytes without mime type) count as "no icon".
    /// An unknown resolver name returns `None` without touching the cache.
    pub async fn search_favicon(
        &self,
        cache: &FaviconCache,
        name: &str,
        authority: &str,
    ) -> Option<Icon> {
        let resolver = self.resolvers.get(name)?;

        match cache.lookup(name, authority).await {
            Lookup::PositiveHit { data, mime } => return Some((data, mime)),
            Lookup::NegativeHit => return None,
            Lookup::Miss => {}
        }

        let icon = match resolver.resolve(authority).await {
            Ok((Some(data), Some(mime))) => Some((data, mime)),
            Ok(_) => None,
            Err(e) => {
                warn!("favicon resolver {} failed for {}: {}", name, authority, e);
                None
            }
        };

        let stored = match &icon {
            Some((data, mime)) => {
                cache
                    .store(name, authority, Some(mime.as_str()), Some(data.as_slice()))
                    .await
            }
            None => cache.store(name, authority, None, None).await,
        };
        if !stored {
            debug!("favicon of {} / {} not cached", name, authority);
        }

        icon
    }
}
