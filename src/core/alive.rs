//! # In-flight invocation tracker.
//!
//! Counts the routine invocations currently running, per routine name. Overlapping
//! invocations of one routine are counted separately.
//!
//! ## Architecture
//! ```text
//! IntervalRunner::fire ──► AliveTracker::enter(name) ──► InFlightGuard
//!                                                             │ (moved into the detached task)
//!                                    task finished/panicked ──┘ drop → count -= 1
//!
//! Scheduler::drain ──► snapshot() (names still running after grace)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread-safe counter of in-flight invocations per routine.
#[derive(Default)]
pub struct AliveTracker {
    state: Mutex<HashMap<Arc<str>, usize>>,
}

impl AliveTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one invocation of `name` as started; the guard marks it finished on drop.
    pub fn enter(self: &Arc<Self>, name: Arc<str>) -> InFlightGuard {
        *self.lock().entry(Arc::clone(&name)).or_insert(0) += 1;
        InFlightGuard {
            tracker: Arc::clone(self),
            name,
        }
    }

    /// Returns sorted names of routines with at least one invocation in flight.
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().map(|n| n.to_string()).collect();
        names.sort_unstable();
        names
    }

    fn leave(&self, name: &str) {
        let mut state = self.lock();
        if let Some(count) = state.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                state.remove(name);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Arc<str>, usize>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Marks one in-flight invocation; releases it on drop.
pub struct InFlightGuard {
    tracker: Arc<AliveTracker>,
    name: Arc<str>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.leave(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_invocations_are_counted() {
        let alive = Arc::new(AliveTracker::new());
        let a = alive.enter(Arc::from("storage"));
        let b = alive.enter(Arc::from("storage"));
        let c = alive.enter(Arc::from("batch"));
        assert_eq!(alive.snapshot(), vec!["batch", "storage"]);

        drop(a);
        drop(c);
        assert_eq!(alive.snapshot(), vec!["storage"]);
        drop(b);
        assert!(alive.snapshot().is_empty());
    }
}
