//! # Bounded concurrency gate.
//!
//! [`BoundedGate`] is a wait-group with a capacity: `add(n)` admits `n` units of work and
//! blocks while fewer than `n` slots are free, `done()` releases one, `wait()` blocks until
//! every admitted unit has called `done()`.
//!
//! A routine walking a dataset of unknown size uses it to cap concurrent upstream calls:
//!
//! ```text
//! for item in items {
//!     gate.add(1).await?;        // blocks once `capacity` walkers are in flight
//!     tokio::spawn(walk(item))   // walker calls gate.done() when finished
//! }
//! gate.wait().await;             // all walkers done → publish the working copy
//! ```
//!
//! ## Rules
//! - `add` must happen **before** spawning the unit, otherwise `wait` may observe zero early.
//! - Releasing more than is outstanding returns [`GateError::OverRelease`] and leaves the
//!   counter untouched.
//! - Capacity `0` means unbounded (plain join-counter).

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};

use crate::error::GateError;

/// Join-counter with a cap on concurrently admitted units.
///
/// Cheap to clone; clones share the same counter.
#[derive(Clone, Debug)]
pub struct BoundedGate {
    slots: Option<Arc<Semaphore>>,
    capacity: usize,
    outstanding: Arc<watch::Sender<usize>>,
}

impl BoundedGate {
    /// Creates a gate admitting at most `capacity` units at once (`0` = unbounded).
    pub fn new(capacity: usize) -> Self {
        let slots = (capacity > 0).then(|| Arc::new(Semaphore::new(capacity)));
        let (tx, _rx) = watch::channel(0usize);
        Self {
            slots,
            capacity,
            outstanding: Arc::new(tx),
        }
    }

    /// Capacity the gate was created with (`0` = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of admitted units that have not called `done()` yet.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Admits `n` units, waiting while fewer than `n` slots are free.
    pub async fn add(&self, n: usize) -> Result<(), GateError> {
        if n == 0 {
            return Ok(());
        }
        if let Some(slots) = &self.slots {
            if n > self.capacity {
                return Err(GateError::ExceedsCapacity {
                    requested: n,
                    capacity: self.capacity,
                });
            }
            let permits = u32::try_from(n).map_err(|_| GateError::ExceedsCapacity {
                requested: n,
                capacity: self.capacity,
            })?;
            let permit = slots
                .acquire_many(permits)
                .await
                .map_err(|_| GateError::Closed)?;
            permit.forget();
        }
        self.outstanding.send_modify(|c| *c += n);
        Ok(())
    }

    /// Releases `n` admitted units.
    pub fn release(&self, n: usize) -> Result<(), GateError> {
        if n == 0 {
            return Ok(());
        }
        let mut outstanding = 0;
        let released = self.outstanding.send_if_modified(|c| {
            outstanding = *c;
            if *c < n {
                return false;
            }
            *c -= n;
            true
        });
        if !released {
            return Err(GateError::OverRelease {
                outstanding,
                requested: n,
            });
        }
        if let Some(slots) = &self.slots {
            slots.add_permits(n);
        }
        Ok(())
    }

    /// Releases one admitted unit.
    pub fn done(&self) -> Result<(), GateError> {
        self.release(1)
    }

    /// Admits one unit and returns a guard that releases it on drop.
    pub async fn admit(&self) -> Result<GatePermit, GateError> {
        self.add(1).await?;
        Ok(GatePermit { gate: self.clone() })
    }

    /// Waits until every admitted unit has been released.
    pub async fn wait(&self) {
        let mut rx = self.outstanding.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|c| *c == 0).await;
    }
}

/// RAII admission: releases its slot when dropped.
#[must_use = "dropping the permit releases the slot immediately"]
#[derive(Debug)]
pub struct GatePermit {
    gate: BoundedGate,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // One admission per permit, so this cannot over-release.
        let _ = self.gate.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_n_plus_one_waits_for_done() {
        let gate = BoundedGate::new(3);
        for _ in 0..3 {
            timeout(Duration::from_millis(50), gate.add(1))
                .await
                .expect("first N admissions must not block")
                .unwrap();
        }
        assert_eq!(gate.outstanding(), 3);

        let g = gate.clone();
        let mut extra = tokio::spawn(async move { g.add(1).await });
        assert!(
            timeout(Duration::from_millis(50), &mut extra).await.is_err(),
            "(N+1)-th admission must block"
        );

        gate.done().unwrap();
        timeout(Duration::from_millis(500), extra)
            .await
            .expect("admission after done()")
            .unwrap()
            .unwrap();
        assert_eq!(gate.outstanding(), 3);
    }

    #[tokio::test]
    async fn test_wait_returns_when_outstanding_reaches_zero() {
        let gate = BoundedGate::new(2);
        gate.add(2).await.unwrap();

        let g = gate.clone();
        let mut waiter = tokio::spawn(async move { g.wait().await });
        assert!(timeout(Duration::from_millis(50), &mut waiter).await.is_err());

        gate.done().unwrap();
        assert!(timeout(Duration::from_millis(50), &mut waiter).await.is_err());

        gate.done().unwrap();
        timeout(Duration::from_millis(500), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_on_idle_gate_returns_immediately() {
        let gate = BoundedGate::new(4);
        timeout(Duration::from_millis(50), gate.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_over_release_is_checked() {
        let gate = BoundedGate::new(2);
        gate.add(1).await.unwrap();
        assert_eq!(
            gate.release(2),
            Err(GateError::OverRelease {
                outstanding: 1,
                requested: 2
            })
        );
        assert_eq!(gate.outstanding(), 1);
        gate.done().unwrap();
        assert!(matches!(gate.done(), Err(GateError::OverRelease { .. })));

        // Counter intact: full capacity is still admissible.
        timeout(Duration::from_millis(50), gate.add(2))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_above_capacity_is_rejected() {
        let gate = BoundedGate::new(2);
        assert_eq!(
            gate.add(3).await,
            Err(GateError::ExceedsCapacity {
                requested: 3,
                capacity: 2
            })
        );
    }

    #[tokio::test]
    async fn test_unbounded_gate_never_blocks() {
        let gate = BoundedGate::new(0);
        timeout(Duration::from_millis(50), gate.add(10_000))
            .await
            .unwrap()
            .unwrap();
        gate.release(10_000).unwrap();
        gate.wait().await;
    }

    #[tokio::test]
    async fn test_fan_out_never_exceeds_capacity() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let gate = BoundedGate::new(4);
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..32 {
            let permit = gate.admit().await.unwrap();
            let live = live.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                live.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }
        gate.wait().await;

        assert_eq!(gate.outstanding(), 0);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }
}
