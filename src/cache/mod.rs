//! # Keyed caches with per-entry expiry.
//!
//! Collection routines cache upstream lookups to stay within rate limits.
//!
//! - [`Cacher`] the cache contract (`get` / `set` / `set_with_ttl`)
//! - [`TtlCache`] in-memory cache whose entries expire, swept periodically
//! - [`NoopCache`] never stores anything, forcing recomputation at every call site
//! - [`CacheRegistry`] hands out one cache per distinct TTL
//!
//! Keys are plain strings shared by every routine using the same cache; pick
//! collision-free keys such as `"<resource-kind>-<id>-<field>"`.

mod noop;
mod registry;
mod ttl;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;

pub use noop::NoopCache;
pub use registry::CacheRegistry;
pub use ttl::TtlCache;

/// Type-erased cached value.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Shared handle to a cache.
pub type CacheRef = Arc<dyn Cacher>;

/// Cache contract shared by [`TtlCache`] and [`NoopCache`].
///
/// A miss is not an error: it is the normal path that triggers recomputation.
pub trait Cacher: Send + Sync + 'static {
    /// Returns the value stored under `key`, unless absent or expired.
    fn get(&self, key: &str) -> Option<CachedValue>;

    /// Stores `value` under `key` for the cache's default TTL.
    fn set(&self, key: &str, value: CachedValue);

    /// Stores `value` under `key` for `ttl`.
    fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration);

    /// Default TTL of this cache.
    fn ttl(&self) -> Duration;

    /// Number of stored entries, expired ones included until the next sweep.
    fn len(&self) -> usize;

    /// True if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl dyn Cacher {
    /// Typed read: `Ok(None)` on a miss, `Err(TypeMismatch)` when the value has another type.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>, CacheError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(Some)
                .map_err(|_| CacheError::TypeMismatch {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                }),
        }
    }

    /// Typed write with the cache's default TTL.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.set(key, Arc::new(value));
    }
}
