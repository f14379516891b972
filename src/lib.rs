//! # cadencevisor
//!
//! **Cadencevisor** is the update scheduler of a pull-based metrics exporter.
//!
//! Collection routines refresh exported gauges from slow, rate-limited upstream APIs.
//! Routines are grouped by refresh cadence; each cadence gets one interval runner that
//! aligns to wall-clock multiples of the cadence and fires every routine of its group
//! concurrently on each tick. Cadences can be changed at runtime by reloading a
//! desired-cadence table.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   register_with_cadence(name, routine, d)        reload(CadenceTable)
//!                  │                                       │
//!                  ▼                                       ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (supervisor)                                           │
//! │  - CadenceRegistry (cadence → {name → routine}, recall record)    │
//! │  - Bus (broadcast events) ─► SubscriberSet (LogWriter, ...)       │
//! │  - SchedulerMetrics (duration histogram/gauge, interval gauge)    │
//! │  - CacheRegistry (one TTL cache per distinct TTL)                 │
//! │  - AliveTracker (in-flight invocations, for shutdown reports)     │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │IntervalRunner│   │IntervalRunner│   │IntervalRunner│  (one per live cadence)
//!   │     30s      │   │     60s      │   │     300s     │
//!   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!          │ every tick: one detached invocation per routine of the group
//!          ▼
//!   run_once(routine, ctx) ─► timeout / panic containment ─► metrics on success
//!          │
//!          └─ publishes RoutineStarting / RoutineSucceeded / RoutineFailed / ...
//! ```
//!
//! ### Lifecycle
//! ```text
//! Scheduler::run(token)
//! loop {
//!   ├─► cadences = registry.cadences()        (under the reload lock)
//!   ├─► none ─► sleep(idle_poll), re-check
//!   ├─► spawn IntervalRunner per cadence:
//!   │       ├─ sleep until now % cadence == 0  (cancellable, no tick if cancelled)
//!   │       └─ tick every cadence ─► fire all routines of the group
//!   ├─► wait for every runner to exit          (reload / cancel_all / cadence set change / shutdown)
//!   └─► token cancelled? ─► exit loop
//! }
//! drain: wait up to grace for in-flight invocations ─► AllStoppedWithin | GraceExceeded
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Routines**      | Collection routines as trait objects or closures.                  | [`Routine`], [`RoutineFn`], [`RoutineRef`]  |
//! | **Scheduling**    | Cadence groups, aligned interval runners, supervision.             | [`Scheduler`], [`CadenceRegistry`]          |
//! | **Reload**        | Apply desired cadences at runtime.                                 | [`CadenceTable`], [`ReloadReport`]          |
//! | **Caching**       | Per-TTL keyed caches with a no-op variant.                         | [`Cacher`], [`TtlCache`], [`CacheRegistry`] |
//! | **Fan-out**       | Bounded concurrency for per-resource upstream calls.               | [`BoundedGate`]                             |
//! | **Metrics**       | Routine duration metrics and atomic snapshot publication.          | [`SchedulerMetrics`], [`Published`]         |
//! | **Subscriber API**| Hook into runtime events (logging, alerting).                      | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors for the runtime, routines and primitives.             | [`RuntimeError`], [`RoutineError`]          |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cadencevisor::{
//!     CadenceTable, LogWriter, RoutineContext, RoutineError, RoutineFn, SchedulerBuilder,
//!     SchedulerConfig, Subscribe,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
//!         .with_subscribers(subs)
//!         .build()?;
//!
//!     let storage = RoutineFn::arc(|ctx: RoutineContext| async move {
//!         if ctx.is_cancelled() {
//!             return Err(RoutineError::Canceled);
//!         }
//!         // query the upstream API, publish gauges ...
//!         Ok(())
//!     });
//!     scheduler
//!         .registry()
//!         .register_with_cadence("storage", storage, Duration::from_secs(60));
//!
//!     // Later, e.g. on a config file change:
//!     let table = CadenceTable::new().with("storage", Duration::from_secs(300));
//!     let report = scheduler.reload(&table).await;
//!     assert_eq!(report.moved, vec!["storage"]);
//!
//!     scheduler.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
mod cache;
mod core;
mod error;
mod events;
mod metrics;
mod routines;
mod subscribers;
mod sync;

// ---- Public re-exports ----

pub use cache::{CacheRef, CacheRegistry, CachedValue, Cacher, NoopCache, TtlCache};
pub use core::{
    CadenceRegistry, CadenceTable, ReloadReport, RunnerExit, Scheduler, SchedulerBuilder,
    SchedulerConfig, alignment_delay, correlation_id,
};
pub use error::{CacheError, GateError, RoutineError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use metrics::{DURATION_BUCKETS, Published, SUBSYSTEM, SchedulerMetrics};
pub use routines::{BoxRoutineFuture, Routine, RoutineContext, RoutineFn, RoutineRef};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use sync::{BoundedGate, GatePermit};
