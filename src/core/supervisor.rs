//! # Scheduler: supervises one interval runner per live cadence.
//!
//! The [`Scheduler`] owns the event bus, the [`SubscriberSet`], the cadence registry,
//! the per-TTL cache registry and the scheduler metrics. [`Scheduler::run`] repeatedly
//! spawns one [`IntervalRunner`] per cadence that currently has routines and waits for
//! all of them to exit; [`Scheduler::cancel_all`] makes them exit so the next pass picks
//! up the registry's new shape.
//!
//! ## High-level architecture
//! ```text
//! run(token)
//!   ├─ subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   │
//!   ├─ supervise: loop until token cancelled {
//!   │     reload_lock ─► cadences = registry.cadences()
//!   │       ├─ none ─► sleep(idle_poll) | wake | cancel
//!   │       └─ for d in cadences:
//!   │             child = token.child_token(); runners[d] = child
//!   │             set.spawn(IntervalRunner(d).run(child))
//!   │     join all runners (cadence set changed ─► cancel_all); runners.clear()
//!   │  }
//!   │
//!   ├─ drain: tracker.close(); timeout(grace, tracker.wait())
//!   │     ├─ Ok  ─► publish AllStoppedWithin
//!   │     └─ Err ─► publish GraceExceeded, return GraceExceeded{ stuck: AliveTracker::snapshot() }
//!   │
//!   └─ stop listener, then timeout(grace, SubscriberSet::flush())
//!
//! reload(table):  reload_lock ─► apply diff to registry ─► cancel_all() (if changed)
//! cancel_all():   cancel every runner token ─► runners exit ─► next pass respawns
//! ```
//!
//! ## Rules
//! - Reloads and runner spawning are serialized by one lock, so a pass never spawns
//!   runners from a half-applied reload.
//! - Invocations are detached (tracked, never awaited by their runner); only shutdown
//!   waits for them, bounded by `grace`.
//! - Cancelling runners never cancels the scheduler itself.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use cadencevisor::{RoutineContext, RoutineFn, SchedulerBuilder, SchedulerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = SchedulerBuilder::new(SchedulerConfig::default()).build()?;
//!
//!     let storage = RoutineFn::arc(|ctx: RoutineContext| async move {
//!         tracing::info!(id = ctx.id(), "collecting storage usage");
//!         Ok(())
//!     });
//!     scheduler
//!         .registry()
//!         .register_with_cadence("storage", storage, Duration::from_secs(300));
//!
//!     scheduler.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{
    alive::AliveTracker,
    config::SchedulerConfig,
    interval::IntervalRunner,
    registry::CadenceRegistry,
    reload::{self, CadenceTable, ReloadReport},
    runner::InvocationEnv,
    shutdown,
};
use crate::{
    cache::CacheRegistry,
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    metrics::SchedulerMetrics,
    subscribers::SubscriberSet,
};

/// Coordinates interval runners, event delivery (via [`SubscriberSet`]) and graceful shutdown.
pub struct Scheduler {
    cfg: SchedulerConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<CadenceRegistry>,
    caches: Arc<CacheRegistry>,
    metrics: SchedulerMetrics,
    alive: Arc<AliveTracker>,
    tracker: TaskTracker,
    runners: Mutex<HashMap<Duration, CancellationToken>>,
    reload_lock: tokio::sync::Mutex<()>,
    wake: Notify,
    running: AtomicBool,
}

impl Scheduler {
    /// Internal constructor used by [`SchedulerBuilder`](crate::SchedulerBuilder).
    pub(crate) fn new_internal(
        cfg: SchedulerConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Arc<CadenceRegistry>,
        caches: Arc<CacheRegistry>,
        metrics: SchedulerMetrics,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            caches,
            metrics,
            alive: Arc::new(AliveTracker::new()),
            tracker: TaskTracker::new(),
            runners: Mutex::new(HashMap::new()),
            reload_lock: tokio::sync::Mutex::new(()),
            wake: Notify::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Registry of routines grouped by cadence.
    pub fn registry(&self) -> &Arc<CadenceRegistry> {
        &self.registry
    }

    /// Per-TTL cache registry shared by routines.
    pub fn caches(&self) -> &Arc<CacheRegistry> {
        &self.caches
    }

    /// Scheduler metrics (`function` labelled).
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Subscribes to the raw event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Names of routines with invocations currently in flight.
    pub fn in_flight(&self) -> Vec<String> {
        self.alive.snapshot()
    }

    /// Runs until `token` is cancelled, then waits up to `grace` for in-flight invocations.
    ///
    /// Returns [`RuntimeError::AlreadyRunning`] if another `run` is active and
    /// [`RuntimeError::GraceExceeded`] if invocations outlived the grace period.
    pub async fn run(&self, token: CancellationToken) -> Result<(), RuntimeError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let listener = CancellationToken::new();
        let _stop_listener = listener.clone().drop_guard();
        let forwarding = self.subscriber_listener(listener.clone());

        self.supervise(&token).await;
        let res = self.drain().await;

        listener.cancel();
        if let Err(e) = forwarding.await {
            tracing::error!(error = %e, "subscriber listener aborted");
        }
        if tokio::time::timeout(self.cfg.grace, self.subs.flush())
            .await
            .is_err()
        {
            tracing::warn!(grace = ?self.cfg.grace, "subscribers did not drain within grace");
        }
        res
    }

    /// Runs until a termination signal (SIGINT/SIGTERM/SIGQUIT or Ctrl-C) arrives.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let run = self.run(token.clone());
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            sig = shutdown::wait_for_shutdown_signal() => match sig {
                Ok(()) => {
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                    token.cancel();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "signal handlers unavailable, running until cancelled");
                }
            },
        }
        run.await
    }

    /// Cancels every running interval runner and returns how many were cancelled.
    ///
    /// The supervisor respawns runners from the registry's current state on its next pass.
    pub fn cancel_all(&self) -> usize {
        let cancelled: Vec<CancellationToken> =
            self.runners_lock().drain().map(|(_, t)| t).collect();
        for token in &cancelled {
            token.cancel();
        }
        self.wake.notify_one();

        self.bus.publish(
            Event::new(EventKind::RunnersCancelled).with_reason(cancelled.len().to_string()),
        );
        cancelled.len()
    }

    /// Applies `table` to the registry and restarts runners if anything changed.
    pub async fn reload(&self, table: &CadenceTable) -> ReloadReport {
        let _guard = self.reload_lock.lock().await;

        let report = reload::apply(table, &self.registry);
        for name in &report.disabled {
            self.metrics.forget_interval(name);
        }
        for name in &report.unknown {
            let ev = Event::new(EventKind::RoutineUnknown).with_routine(name.as_str());
            let ev = match table.get(name) {
                Some(d) => ev.with_cadence(d),
                None => ev,
            };
            self.bus.publish(ev);
        }
        self.bus
            .publish(Event::new(EventKind::ReloadApplied).with_reason(report.summary()));

        if report.changed() {
            self.cancel_all();
        }
        report
    }

    /// Spawns runners for the live cadences, waits for them, repeats until cancelled.
    ///
    /// A change of the cadence set made directly on the registry restarts the pass.
    async fn supervise(&self, token: &CancellationToken) {
        let mut cadence_changes = self.registry.watch_cadences();
        while !token.is_cancelled() {
            let mut set = JoinSet::new();
            {
                let _guard = self.reload_lock.lock().await;
                cadence_changes.borrow_and_update();
                let mut runners = self.runners_lock();
                for cadence in self.registry.cadences() {
                    let child = token.child_token();
                    runners.insert(cadence, child.clone());
                    set.spawn(self.interval_runner(cadence).run(child));
                }
            }

            if set.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.cfg.idle_poll) => {}
                    _ = self.wake.notified() => {}
                    _ = cadence_changes.changed() => {}
                    _ = token.cancelled() => {}
                }
                continue;
            }

            let mut watching = true;
            loop {
                tokio::select! {
                    res = set.join_next() => match res {
                        Some(Err(e)) => tracing::error!(error = %e, "interval runner aborted"),
                        Some(Ok(_)) => {}
                        None => break,
                    },
                    changed = cadence_changes.changed(), if watching => match changed {
                        Ok(()) => {
                            // Empty when a reload already cancelled this pass.
                            let live = !self.runners_lock().is_empty();
                            if live {
                                self.cancel_all();
                            }
                        }
                        Err(_) => watching = false,
                    },
                }
            }
            self.runners_lock().clear();
        }
    }

    /// Waits for detached invocations within the configured grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the routines still in flight.
    async fn drain(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        self.tracker.close();
        let timed = tokio::time::timeout(grace, self.tracker.wait()).await;
        self.tracker.reopen();

        match timed {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.alive.snapshot();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set until `stop`.
    ///
    /// Events already queued when `stop` fires are still delivered.
    fn subscriber_listener(&self, stop: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
        })
    }

    fn interval_runner(&self, cadence: Duration) -> IntervalRunner {
        IntervalRunner::new(
            cadence,
            Arc::clone(&self.registry),
            Arc::clone(&self.alive),
            self.tracker.clone(),
            InvocationEnv {
                bus: self.bus.clone(),
                metrics: self.metrics.clone(),
                timeout: self.cfg.routine_timeout(),
            },
        )
    }

    fn runners_lock(&self) -> MutexGuard<'_, HashMap<Duration, CancellationToken>> {
        self.runners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Clears the running flag when `run` returns or is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
