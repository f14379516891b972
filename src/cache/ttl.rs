//! # In-memory TTL cache.
//!
//! Entries carry their own expiry instant. A read past expiry behaves as a miss even if
//! the sweep has not run yet; the sweep task only reclaims memory.
//!
//! ```text
//! set(k, v, ttl) ─► entries[k] = (v, now + ttl)
//! get(k)         ─► entries[k] if now < expires_at, else miss
//! sweep task     ─► every `sweep` period: drop expired entries
//!                   (exits once the cache is dropped or the token is cancelled)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{CachedValue, Cacher};

/// Stand-in for "never" when `now + d` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + after`, saturating to [`FAR_FUTURE`] from now.
fn deadline(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

struct Entry {
    value: CachedValue,
    expires_at: Instant,
}

/// Keyed cache with per-entry expiry.
pub struct TtlCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl TtlCache {
    /// Creates a cache without a background sweep.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Creates a cache and spawns its expiry sweep (one tick every `sweep`).
    ///
    /// Must be called from within a tokio runtime. The sweep holds only a weak
    /// reference and stops when the cache is dropped or `token` is cancelled.
    pub fn with_sweep(ttl: Duration, sweep: Duration, token: CancellationToken) -> Arc<Self> {
        let cache = Arc::new(Self::new(ttl));
        if !sweep.is_zero() {
            tokio::spawn(sweep_loop(Arc::downgrade(&cache), sweep, token));
        }
        cache
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

impl Cacher for TtlCache {
    fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| Arc::clone(&e.value))
    }

    fn set(&self, key: &str, value: CachedValue) {
        self.set_with_ttl(key, value, self.ttl);
    }

    fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: deadline(ttl),
        };
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

async fn sweep_loop(cache: Weak<TtlCache>, sweep: Duration, token: CancellationToken) {
    let mut ticker = time::interval_at(deadline(sweep), sweep);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = token.cancelled() => return,
        }
        match cache.upgrade() {
            Some(cache) => {
                cache.purge_expired();
            }
            None => return,
        }
    }
}
