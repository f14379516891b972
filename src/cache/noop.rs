use std::time::Duration;

use super::{CachedValue, Cacher};

/// Cache that never hits.
///
/// Swapped in for [`TtlCache`](super::TtlCache) when caching is disabled, so call sites
/// stay untouched.
#[derive(Debug, Clone)]
pub struct NoopCache {
    ttl: Duration,
}

impl NoopCache {
    /// Creates a cache that reports `ttl` but stores nothing.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl Cacher for NoopCache {
    fn get(&self, _key: &str) -> Option<CachedValue> {
        None
    }

    fn set(&self, _key: &str, _value: CachedValue) {}

    fn set_with_ttl(&self, _key: &str, _value: CachedValue, _ttl: Duration) {}

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRef;
    use std::sync::Arc;

    #[test]
    fn test_noop_never_hits() {
        let cache: CacheRef = Arc::new(NoopCache::new(Duration::from_secs(60)));
        cache.put("subscription-1-name", "prod".to_string());
        assert!(cache.get("subscription-1-name").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.ttl(), Duration::from_secs(60));
    }
}
