//! # Interval runner: one per live cadence.
//!
//! An [`IntervalRunner`] first waits until wall-clock time is a whole multiple of its
//! cadence, then ticks at that cadence. On every tick it looks up the routines currently
//! registered at the cadence and fires one detached invocation per routine.
//!
//! ## Lifecycle
//! ```text
//! run(token)
//!   ├─► publish RunnerStarting
//!   ├─► aligning: sleep(alignment_delay(now, cadence))   (cancellable)
//!   │        └─ cancelled ─► publish RunnerCancelled("aligning"), exit (no tick)
//!   ├─► publish RunnerAligned
//!   └─► ticking: loop {
//!          ├─ cancelled ─► publish RunnerCancelled("ticking"), exit
//!          └─ tick ─► fire(): for (name, routine) in registry.routines_for(cadence)
//!                        ├─ set interval gauge
//!                        └─ tracker.spawn(run_once(...))   (never awaited here)
//!       }
//! ```
//!
//! ## Rules
//! - The first tick fires right after alignment, then every `cadence`.
//! - Invocations never block the tick loop: a slow routine may overlap its next tick.
//! - Missed ticks are skipped, not replayed.
//! - Invocation tokens are children of the runner token, so cancelling the runner
//!   cancels the contexts of its in-flight invocations.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::alive::AliveTracker;
use super::registry::CadenceRegistry;
use super::runner::{Invocation, InvocationEnv, run_once};
use crate::events::{Event, EventKind};

/// Phase a runner was in when it observed cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerExit {
    /// Cancelled before the first tick.
    Aligning,
    /// Cancelled after ticking started.
    Ticking,
}

impl RunnerExit {
    /// Stable label used as the `RunnerCancelled` reason.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerExit::Aligning => "aligning",
            RunnerExit::Ticking => "ticking",
        }
    }
}

/// Time until the next instant that is a whole multiple of `cadence` since the Unix epoch.
///
/// The result is in `(0, cadence]`: an instant already on the boundary waits one full
/// cadence. A zero cadence yields zero.
pub fn alignment_delay(now: SystemTime, cadence: Duration) -> Duration {
    let step = cadence.as_nanos();
    if step == 0 {
        return Duration::ZERO;
    }
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let wait = step - since_epoch % step;
    Duration::from_nanos(u64::try_from(wait).unwrap_or(u64::MAX))
}

/// Periodic driver of all routines registered at one cadence.
pub(crate) struct IntervalRunner {
    cadence: Duration,
    registry: Arc<CadenceRegistry>,
    alive: Arc<AliveTracker>,
    tracker: TaskTracker,
    env: InvocationEnv,
}

impl IntervalRunner {
    pub(crate) fn new(
        cadence: Duration,
        registry: Arc<CadenceRegistry>,
        alive: Arc<AliveTracker>,
        tracker: TaskTracker,
        env: InvocationEnv,
    ) -> Self {
        Self {
            cadence,
            registry,
            alive,
            tracker,
            env,
        }
    }

    /// Aligns, then ticks until `token` is cancelled.
    pub(crate) async fn run(self, token: CancellationToken) -> RunnerExit {
        self.env
            .bus
            .publish(Event::new(EventKind::RunnerStarting).with_cadence(self.cadence));

        let wait = alignment_delay(SystemTime::now(), self.cadence);
        tokio::select! {
            _ = time::sleep(wait) => {}
            _ = token.cancelled() => return self.exit(RunnerExit::Aligning),
        }
        self.env.bus.publish(
            Event::new(EventKind::RunnerAligned)
                .with_cadence(self.cadence)
                .with_duration(wait),
        );

        let mut ticker = time::interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return self.exit(RunnerExit::Ticking),
                _ = ticker.tick() => {}
            }
            self.fire(&token, SystemTime::now());
        }
    }

    /// Fires one detached invocation per routine live at this cadence.
    ///
    /// Returns the number of invocations spawned.
    pub(crate) fn fire(&self, token: &CancellationToken, tick: SystemTime) -> usize {
        let routines = self.registry.routines_for(self.cadence);
        for (name, routine) in &routines {
            self.env.metrics.set_interval(name, self.cadence);

            let inv = Invocation {
                name: Arc::clone(name),
                routine: Arc::clone(routine),
                cadence: self.cadence,
                tick,
            };
            let guard = self.alive.enter(Arc::clone(name));
            let token = token.clone();
            let env = self.env.clone();
            self.tracker.spawn(async move {
                let _guard = guard;
                let _ = run_once(inv, &token, &env).await;
            });
        }
        routines.len()
    }

    fn exit(&self, phase: RunnerExit) -> RunnerExit {
        self.env.bus.publish(
            Event::new(EventKind::RunnerCancelled)
                .with_cadence(self.cadence)
                .with_reason(phase.as_label()),
        );
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoutineError;
    use crate::events::Bus;
    use crate::metrics::SchedulerMetrics;
    use crate::routines::{RoutineContext, RoutineFn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    fn runner(cadence: Duration, registry: Arc<CadenceRegistry>) -> (IntervalRunner, Bus) {
        let bus = Bus::new(256);
        let env = InvocationEnv {
            bus: bus.clone(),
            metrics: SchedulerMetrics::new("test").unwrap(),
            timeout: None,
        };
        let runner = IntervalRunner::new(
            cadence,
            registry,
            Arc::new(AliveTracker::new()),
            TaskTracker::new(),
            env,
        );
        (runner, bus)
    }

    #[test]
    fn test_alignment_delay() {
        let minute = Duration::from_secs(60);
        let at = |secs: u64, nanos: u32| UNIX_EPOCH + Duration::new(secs, nanos);

        assert_eq!(alignment_delay(at(120, 0), minute), minute);
        assert_eq!(alignment_delay(at(121, 0), minute), Duration::from_secs(59));
        assert_eq!(
            alignment_delay(at(179, 500_000_000), minute),
            Duration::from_millis(500)
        );
        assert_eq!(alignment_delay(at(7, 0), Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_alignment_delay_is_bounded() {
        let cadence = Duration::from_millis(1500);
        for offset in 0..100u64 {
            let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000 + offset * 37);
            let wait = alignment_delay(now, cadence);
            assert!(wait > Duration::ZERO && wait <= cadence);
            let next = (now + wait).duration_since(UNIX_EPOCH).unwrap();
            assert_eq!(next.as_millis() % cadence.as_millis(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_aligning_never_ticks() {
        let registry = Arc::new(CadenceRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        registry.register_with_cadence(
            "storage",
            RoutineFn::arc(move |_ctx: RoutineContext| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
            Duration::from_secs(3600),
        );

        let (runner, bus) = runner(Duration::from_secs(3600), registry);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let handle = tokio::spawn(runner.run(token.clone()));

        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), RunnerExit::Aligning);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(kinds, vec![EventKind::RunnerStarting, EventKind::RunnerCancelled]);
    }

    #[tokio::test]
    async fn test_fire_starts_all_routines_concurrently() {
        const K: usize = 4;
        let registry = Arc::new(CadenceRegistry::default());
        let barrier = Arc::new(Barrier::new(K + 1));
        for i in 0..K {
            let barrier = barrier.clone();
            registry.register_with_cadence(
                &format!("routine-{i}"),
                RoutineFn::arc(move |_ctx: RoutineContext| {
                    let barrier = barrier.clone();
                    async move {
                        barrier.wait().await;
                        Ok(())
                    }
                }),
                Duration::from_secs(60),
            );
        }

        let (runner, _bus) = runner(Duration::from_secs(60), registry);
        let token = CancellationToken::new();
        assert_eq!(runner.fire(&token, SystemTime::now()), K);

        // Completes only if all K invocations are parked on the barrier at once.
        tokio::time::timeout(Duration::from_secs(5), barrier.wait())
            .await
            .expect("all invocations started before any finished");

        runner.tracker.close();
        runner.tracker.wait().await;
    }

    #[tokio::test]
    async fn test_fire_sees_registry_changes() {
        let registry = Arc::new(CadenceRegistry::default());
        let ok = || RoutineFn::arc(|_ctx: RoutineContext| async { Ok::<(), RoutineError>(()) });
        registry.register_with_cadence("a", ok(), Duration::from_secs(60));

        let (runner, _bus) = runner(Duration::from_secs(60), registry.clone());
        let token = CancellationToken::new();
        assert_eq!(runner.fire(&token, SystemTime::now()), 1);

        registry.register_with_cadence("b", ok(), Duration::from_secs(60));
        registry.register_with_cadence("a", ok(), Duration::from_secs(300));
        assert_eq!(runner.fire(&token, SystemTime::now()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_after_alignment() {
        let cadence = Duration::from_secs(10);
        let registry = Arc::new(CadenceRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        registry.register_with_cadence(
            "storage",
            RoutineFn::arc(move |_ctx: RoutineContext| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
            cadence,
        );

        let (runner, _bus) = runner(cadence, registry);
        let tracker = runner.tracker.clone();
        let token = CancellationToken::new();
        let handle = tokio::spawn(runner.run(token.clone()));

        // Alignment waits at most one cadence; then one tick per cadence.
        tokio::time::sleep(cadence * 3 - Duration::from_millis(1)).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), RunnerExit::Ticking);
        tracker.close();
        tracker.wait().await;

        let n = calls.load(Ordering::SeqCst);
        assert!((2..=3).contains(&n), "unexpected tick count {n}");
    }
}
