//! # Cadence group registry.
//!
//! Owns the mapping `cadence → {routine name → routine}` plus an append-only record of
//! every routine ever registered, so a disabled routine can be re-enabled by name.
//!
//! ## Architecture
//! ```text
//! register_with_cadence(name, r, d) ──┐
//! unregister(name) ───────────────────┼──► RwLock<Inner>
//! recall / cadence_of / cadences ─────┤       ├─ seen:       name → routine   (append-only)
//! routines_for(d) (runners, per tick)─┘       └─ by_cadence: d → {name → routine}
//! ```
//!
//! ## Rules
//! - A name is live under **at most one** cadence; registering it elsewhere moves it.
//! - Every live name is also in `seen`; `seen` entries are never removed.
//! - A cadence whose bucket becomes empty is dropped (it has no runner).
//! - Cadence `0` means "disabled": registering with it unregisters.
//! - Every operation takes the lock once, so readers never see a name in two buckets or
//!   in none mid-move; `routines_for` returns a copy taken under the read lock.
//! - Every change of the cadence set (a bucket created or dropped) bumps a generation
//!   published on a `watch` channel; the scheduler restarts its runners on it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::watch;

use crate::routines::RoutineRef;

type Bucket = HashMap<Arc<str>, RoutineRef>;

#[derive(Default)]
struct Inner {
    seen: HashMap<Arc<str>, RoutineRef>,
    by_cadence: BTreeMap<Duration, Bucket>,
}

impl Inner {
    /// Removes `name` from whichever bucket holds it.
    fn take_live(&mut self, name: &str) -> Option<(Duration, RoutineRef)> {
        let cadence = self
            .by_cadence
            .iter()
            .find_map(|(d, bucket)| bucket.contains_key(name).then_some(*d))?;
        let bucket = self.by_cadence.get_mut(&cadence)?;
        let routine = bucket.remove(name)?;
        if bucket.is_empty() {
            self.by_cadence.remove(&cadence);
        }
        Some((cadence, routine))
    }

    fn cadence_set(&self) -> Vec<Duration> {
        self.by_cadence.keys().copied().collect()
    }
}

/// Thread-safe registry of routines grouped by cadence.
pub struct CadenceRegistry {
    inner: RwLock<Inner>,
    default_cadence: Duration,
    generation: watch::Sender<u64>,
}

impl CadenceRegistry {
    /// Creates an empty registry; `register` uses `default_cadence`.
    pub fn new(default_cadence: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            default_cadence,
            generation: watch::Sender::new(0),
        }
    }

    /// Cadence used by [`register`](Self::register).
    pub fn default_cadence(&self) -> Duration {
        self.default_cadence
    }

    /// Registers `routine` under `name` at the default cadence.
    pub fn register(&self, name: &str, routine: RoutineRef) -> Option<Duration> {
        self.register_with_cadence(name, routine, self.default_cadence)
    }

    /// Registers `routine` under `name` at `cadence`.
    ///
    /// - first registration of `name` is remembered for [`recall`](Self::recall);
    /// - if `name` is live under another cadence it is moved;
    /// - `cadence == 0` unregisters instead.
    ///
    /// Returns the cadence `name` was live under before the call, if any.
    pub fn register_with_cadence(
        &self,
        name: &str,
        routine: RoutineRef,
        cadence: Duration,
    ) -> Option<Duration> {
        if cadence.is_zero() {
            return self.unregister_inner(name).map(|(d, _)| d);
        }

        let mut guard = self.write();
        let inner = &mut *guard;
        let before = inner.cadence_set();
        let existing = inner.seen.get_key_value(name).map(|(k, _)| Arc::clone(k));
        let key = match existing {
            Some(k) => k,
            None => {
                let k: Arc<str> = Arc::from(name);
                inner.seen.insert(Arc::clone(&k), Arc::clone(&routine));
                k
            }
        };
        let previous = inner.take_live(name).map(|(d, _)| d);
        inner
            .by_cadence
            .entry(cadence)
            .or_default()
            .insert(key, routine);
        self.bump_if_changed(&before, inner);
        previous
    }

    /// Removes `name` from its cadence and returns the routine, or `None` if not live.
    ///
    /// The routine stays recallable.
    pub fn unregister(&self, name: &str) -> Option<RoutineRef> {
        self.unregister_inner(name).map(|(_, r)| r)
    }

    fn unregister_inner(&self, name: &str) -> Option<(Duration, RoutineRef)> {
        let mut guard = self.write();
        let before = guard.cadence_set();
        let taken = guard.take_live(name);
        self.bump_if_changed(&before, &guard);
        taken
    }

    /// Subscribes to cadence-set changes.
    ///
    /// The value is a generation counter; it changes whenever a cadence gains its first
    /// routine or loses its last one.
    pub fn watch_cadences(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump_if_changed(&self, before: &[Duration], inner: &Inner) {
        if !inner.by_cadence.keys().eq(before.iter()) {
            self.generation.send_modify(|g| *g += 1);
        }
    }

    /// Returns the routine first registered under `name`, live or not.
    pub fn recall(&self, name: &str) -> Option<RoutineRef> {
        self.read().seen.get(name).cloned()
    }

    /// Returns the cadence `name` is live under.
    pub fn cadence_of(&self, name: &str) -> Option<Duration> {
        self.read()
            .by_cadence
            .iter()
            .find_map(|(d, bucket)| bucket.contains_key(name).then_some(*d))
    }

    /// Sorted list of cadences with at least one live routine.
    pub fn cadences(&self) -> Vec<Duration> {
        self.read().by_cadence.keys().copied().collect()
    }

    /// Copy of the live routines at `cadence`, sorted by name.
    pub fn routines_for(&self, cadence: Duration) -> Vec<(Arc<str>, RoutineRef)> {
        let inner = self.read();
        let mut routines: Vec<(Arc<str>, RoutineRef)> = inner
            .by_cadence
            .get(&cadence)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(n, r)| (Arc::clone(n), Arc::clone(r)))
                    .collect()
            })
            .unwrap_or_default();
        drop(inner);
        routines.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        routines
    }

    /// Live assignment as `cadence → sorted names`.
    pub fn assignments(&self) -> BTreeMap<Duration, Vec<String>> {
        self.read()
            .by_cadence
            .iter()
            .map(|(d, bucket)| {
                let mut names: Vec<String> = bucket.keys().map(|n| n.to_string()).collect();
                names.sort_unstable();
                (*d, names)
            })
            .collect()
    }

    /// Number of live routines.
    pub fn len(&self) -> usize {
        self.read().by_cadence.values().map(HashMap::len).sum()
    }

    /// True if no routine is live.
    pub fn is_empty(&self) -> bool {
        self.read().by_cadence.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for CadenceRegistry {
    /// Registry with a 30s default cadence.
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::{RoutineContext, RoutineFn};

    const SEC: Duration = Duration::from_secs(1);

    fn noop() -> RoutineRef {
        RoutineFn::arc(|_ctx: RoutineContext| async { Ok(()) })
    }

    #[test]
    fn test_move_is_exclusive() {
        let registry = CadenceRegistry::default();
        let f = noop();
        assert_eq!(registry.register_with_cadence("storage", f.clone(), 60 * SEC), None);
        assert_eq!(
            registry.register_with_cadence("storage", f, 300 * SEC),
            Some(60 * SEC)
        );

        assert_eq!(registry.cadence_of("storage"), Some(300 * SEC));
        assert!(registry.routines_for(60 * SEC).is_empty());
        assert_eq!(registry.cadences(), vec![300 * SEC]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregistered_routine_is_recallable() {
        let registry = CadenceRegistry::default();
        let f = noop();
        registry.register_with_cadence("batch", f.clone(), 30 * SEC);

        let removed = registry.unregister("batch").expect("live routine");
        assert!(Arc::ptr_eq(&removed, &f));
        assert_eq!(registry.cadence_of("batch"), None);
        assert!(registry.unregister("batch").is_none());

        let recalled = registry.recall("batch").expect("seen routine");
        assert!(Arc::ptr_eq(&recalled, &f));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_is_idempotent() {
        let once = CadenceRegistry::default();
        let twice = CadenceRegistry::default();
        let f = noop();

        once.register_with_cadence("graph", f.clone(), 60 * SEC);
        twice.register_with_cadence("graph", f.clone(), 60 * SEC);
        twice.register_with_cadence("graph", f.clone(), 60 * SEC);

        assert_eq!(once.assignments(), twice.assignments());
        assert_eq!(twice.len(), 1);
        assert!(Arc::ptr_eq(&twice.recall("graph").unwrap(), &f));
    }

    #[test]
    fn test_recall_keeps_first_registration() {
        let registry = CadenceRegistry::default();
        let first = noop();
        let second = noop();
        registry.register_with_cadence("batch", first.clone(), 30 * SEC);
        registry.register_with_cadence("batch", second.clone(), 30 * SEC);

        assert!(Arc::ptr_eq(&registry.recall("batch").unwrap(), &first));
        let live = registry.routines_for(30 * SEC);
        assert!(Arc::ptr_eq(&live[0].1, &second));
    }

    #[test]
    fn test_zero_cadence_disables() {
        let registry = CadenceRegistry::default();
        registry.register_with_cadence("storage", noop(), 60 * SEC);
        assert_eq!(
            registry.register_with_cadence("storage", noop(), Duration::ZERO),
            Some(60 * SEC)
        );
        assert_eq!(registry.cadence_of("storage"), None);
        assert!(registry.cadences().is_empty());
        assert!(registry.recall("storage").is_some());
    }

    #[test]
    fn test_generation_follows_cadence_set() {
        let registry = CadenceRegistry::default();
        let rx = registry.watch_cadences();
        let generation = || *rx.borrow();

        registry.register_with_cadence("a", noop(), 10 * SEC);
        assert_eq!(generation(), 1);
        registry.register_with_cadence("b", noop(), 10 * SEC);
        assert_eq!(generation(), 1);
        registry.register_with_cadence("b", noop(), 20 * SEC);
        assert_eq!(generation(), 2);
        registry.register_with_cadence("b", noop(), 20 * SEC);
        assert_eq!(generation(), 2);
        registry.unregister("a");
        assert_eq!(generation(), 3);
        registry.register_with_cadence("a", noop(), 20 * SEC);
        assert_eq!(generation(), 3);
        assert!(registry.unregister("ghost").is_none());
        assert_eq!(generation(), 3);
    }

    #[test]
    fn test_unknown_names_are_not_found() {
        let registry = CadenceRegistry::default();
        assert!(registry.unregister("ghost").is_none());
        assert!(registry.recall("ghost").is_none());
        assert_eq!(registry.cadence_of("ghost"), None);
    }

    #[test]
    fn test_register_uses_default_cadence() {
        let registry = CadenceRegistry::new(45 * SEC);
        registry.register("api_rate_limiting", noop());
        assert_eq!(registry.cadence_of("api_rate_limiting"), Some(45 * SEC));
    }

    #[test]
    fn test_routines_for_is_sorted_snapshot() {
        let registry = CadenceRegistry::default();
        for name in ["c", "a", "b"] {
            registry.register_with_cadence(name, noop(), 10 * SEC);
        }
        let snapshot = registry.routines_for(10 * SEC);
        registry.unregister("a");

        let names: Vec<&str> = snapshot.iter().map(|(n, _)| n.as_ref()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.routines_for(10 * SEC).len(), 2);
    }

    #[test]
    fn test_concurrent_moves_never_duplicate() {
        let registry = Arc::new(CadenceRegistry::default());
        let f = noop();
        registry.register_with_cadence("hot", f.clone(), SEC);

        let writers: Vec<_> = (1..=4u64)
            .map(|i| {
                let registry = registry.clone();
                let f = f.clone();
                std::thread::spawn(move || {
                    for j in 0..500u64 {
                        registry.register_with_cadence("hot", f.clone(), SEC * ((i + j) % 5 + 1) as u32);
                    }
                })
            })
            .collect();

        for _ in 0..500 {
            let live: usize = registry
                .assignments()
                .values()
                .map(|names| names.iter().filter(|n| *n == "hot").count())
                .sum();
            assert_eq!(live, 1);
        }
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(registry.len(), 1);
    }
}
