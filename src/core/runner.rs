//! # Run a single invocation of a collection routine.
//!
//! Executes one invocation of a [`Routine`] with optional timeout and panic containment,
//! records duration metrics on success and publishes lifecycle events to [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! publish RoutineStarting
//!
//! Success:
//!   routine.run(ctx) → Ok(())  → observe_success(duration) → publish RoutineSucceeded
//!
//! Failure:
//!   routine.run(ctx) → Err(e)  → publish RoutineFailed (metrics withheld)
//!
//! Timeout:
//!   timeout exceeded → cancel ctx → publish RoutineTimedOut
//!                                 → publish RoutineFailed (timeout)
//!
//! Panic:
//!   routine panics   → publish RoutinePanicked
//!                    → publish RoutineFailed (panic message)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `RoutineSucceeded` or `RoutineFailed`
//! - Duration metrics are recorded **only** on success
//! - Derives a **child token** per invocation; cancelling it never affects the runner
//! - The correlation id is derived from the tick time and the routine name

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use sha2::{Digest, Sha256};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    error::RoutineError,
    events::{Bus, Event, EventKind},
    metrics::SchedulerMetrics,
    routines::{RoutineContext, RoutineRef},
    subscribers::panic_message,
};

/// Length (in hex characters) of a correlation id.
const CORRELATION_LEN: usize = 8;

/// One scheduled invocation: which routine, at which cadence, fired at which tick.
#[derive(Clone)]
pub(crate) struct Invocation {
    pub name: Arc<str>,
    pub routine: RoutineRef,
    pub cadence: Duration,
    pub tick: SystemTime,
}

/// Shared dependencies of every invocation fired by one runner.
#[derive(Clone)]
pub(crate) struct InvocationEnv {
    pub bus: Bus,
    pub metrics: SchedulerMetrics,
    pub timeout: Option<Duration>,
}

/// Derives the correlation id of one invocation.
///
/// First 8 hex characters of `sha256("<name>:<tick nanos since epoch>")`; stable for
/// a given `(tick, name)` pair.
pub fn correlation_id(tick: SystemTime, name: &str) -> String {
    let nanos = tick
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let digest = Sha256::digest(format!("{name}:{nanos}").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(CORRELATION_LEN);
    id
}

/// Executes a single invocation, publishing lifecycle events to `env.bus`.
///
/// Returns the measured duration on success.
pub(crate) async fn run_once(
    inv: Invocation,
    parent: &CancellationToken,
    env: &InvocationEnv,
) -> Result<Duration, RoutineError> {
    let child = parent.child_token();
    let id: Arc<str> = Arc::from(correlation_id(inv.tick, &inv.name));
    let ctx = RoutineContext::new(
        child.clone(),
        Arc::clone(&id),
        Arc::clone(&inv.name),
        inv.cadence,
        inv.tick,
    );

    env.bus.publish(
        Event::new(EventKind::RoutineStarting)
            .with_routine(Arc::clone(&inv.name))
            .with_cadence(inv.cadence)
            .with_correlation(Arc::clone(&id)),
    );

    let routine = Arc::clone(&inv.routine);
    let guarded = AssertUnwindSafe(async move { routine.run(ctx).await }).catch_unwind();

    let started = Instant::now();
    let outcome = match env.timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, guarded).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                env.bus.publish(
                    Event::new(EventKind::RoutineTimedOut)
                        .with_routine(Arc::clone(&inv.name))
                        .with_cadence(inv.cadence)
                        .with_correlation(Arc::clone(&id))
                        .with_duration(dur),
                );
                Ok(Err(RoutineError::Timeout { timeout: dur }))
            }
        },
        None => guarded.await,
    };
    let took = started.elapsed();

    let res = match outcome {
        Ok(res) => res,
        Err(payload) => {
            let info = panic_message(payload.as_ref());
            env.bus.publish(
                Event::new(EventKind::RoutinePanicked)
                    .with_routine(Arc::clone(&inv.name))
                    .with_cadence(inv.cadence)
                    .with_correlation(Arc::clone(&id))
                    .with_reason(info.clone()),
            );
            Err(RoutineError::fail(format!("panicked: {info}")))
        }
    };

    match res {
        Ok(()) => {
            env.metrics.observe_success(&inv.name, took);
            env.bus.publish(
                Event::new(EventKind::RoutineSucceeded)
                    .with_routine(Arc::clone(&inv.name))
                    .with_cadence(inv.cadence)
                    .with_correlation(id)
                    .with_duration(took),
            );
            Ok(took)
        }
        Err(e) => {
            env.bus.publish(
                Event::new(EventKind::RoutineFailed)
                    .with_routine(Arc::clone(&inv.name))
                    .with_cadence(inv.cadence)
                    .with_correlation(id)
                    .with_duration(took)
                    .with_reason(e.to_string()),
            );
            Err(e)
        }
    }
}
