//! # One cache per TTL.
//!
//! [`CacheRegistry::get_cache`] returns the same [`CacheRef`] for every request with the
//! same TTL and allocates a new cache (with its sweep task) on first use of a new TTL.
//! When built with `noop = true` every cache handed out is a [`NoopCache`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{CacheRef, NoopCache, TtlCache};

/// Lazily populated map `ttl → cache`.
pub struct CacheRegistry {
    caches: Mutex<HashMap<Duration, CacheRef>>,
    sweep: Duration,
    noop: bool,
    token: CancellationToken,
}

impl CacheRegistry {
    /// Creates an empty registry.
    ///
    /// - `sweep`: expiry sweep period of every cache (`0s` = no sweep task)
    /// - `noop`: hand out [`NoopCache`]s instead of [`TtlCache`]s
    pub fn new(sweep: Duration, noop: bool) -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
            sweep,
            noop,
            token: CancellationToken::new(),
        }
    }

    /// Returns the cache for `ttl`, allocating it on first request.
    ///
    /// The first request for a new TTL on a caching registry spawns a sweep task and so
    /// must happen inside a tokio runtime.
    pub fn get_cache(&self, ttl: Duration) -> CacheRef {
        let mut caches = self
            .caches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cache = caches.entry(ttl).or_insert_with(|| {
            if self.noop {
                Arc::new(NoopCache::new(ttl)) as CacheRef
            } else {
                TtlCache::with_sweep(ttl, self.sweep, self.token.child_token()) as CacheRef
            }
        });
        Arc::clone(cache)
    }

    /// True if this registry hands out no-op caches.
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Number of distinct TTLs allocated so far.
    pub fn len(&self) -> usize {
        self.caches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True if no cache has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_ttl_same_instance() {
        let registry = CacheRegistry::new(Duration::from_secs(120), false);
        let a = registry.get_cache(Duration::from_secs(300));
        let b = registry.get_cache(Duration::from_secs(300));
        let c = registry.get_cache(Duration::from_secs(30));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_shared_instance_shares_entries() {
        let registry = CacheRegistry::new(Duration::from_secs(120), false);
        registry
            .get_cache(Duration::from_secs(300))
            .put("subscription-1-name", "prod".to_string());

        let hit = registry
            .get_cache(Duration::from_secs(300))
            .get_as::<String>("subscription-1-name")
            .unwrap();
        assert_eq!(hit.as_deref().map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_noop_registry_never_hits() {
        let registry = CacheRegistry::new(Duration::from_secs(120), true);
        let cache = registry.get_cache(Duration::from_secs(300));
        cache.put("k", 1u32);
        assert!(cache.get("k").is_none());
        assert!(registry.is_noop());
        assert!(Arc::ptr_eq(&cache, &registry.get_cache(Duration::from_secs(300))));
    }
}
