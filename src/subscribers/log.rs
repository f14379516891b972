//! # LogWriter: structured event logger
//!
//! A subscriber that renders incoming [`Event`]s as `tracing` records. Routine events
//! carry the correlation fields `id`, `interval` and `func`, so every line of one
//! invocation can be grepped together.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO interval=60s: start interval update metrics process
//! INFO interval=60s wait_ms=41234: aligned with wall clock
//! INFO id="9f86d081" interval=60s func="storage": start update metrics function
//! INFO id="9f86d081" interval=60s func="storage" duration_ms=5321: end update metrics function
//! WARN id="9f86d081" interval=60s func="storage" err="upstream 429": update metrics function failed
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Structured log subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn interval(e: &Event) -> Duration {
    Duration::from_millis(e.cadence_ms.unwrap_or_default())
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let id = e.correlation.as_deref().unwrap_or("00000000");
        let func = e.routine.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::RunnerStarting => {
                info!(interval = ?interval(e), "start interval update metrics process");
            }
            EventKind::RunnerAligned => {
                info!(
                    interval = ?interval(e),
                    wait_ms = e.duration_ms,
                    "aligned with wall clock"
                );
            }
            EventKind::RunnerCancelled => {
                info!(
                    interval = ?interval(e),
                    phase = reason,
                    "interval process context has been canceled"
                );
            }
            EventKind::RoutineStarting => {
                info!(id, interval = ?interval(e), func, "start update metrics function");
            }
            EventKind::RoutineSucceeded => {
                info!(
                    id,
                    interval = ?interval(e),
                    func,
                    duration_ms = e.duration_ms,
                    "end update metrics function"
                );
            }
            EventKind::RoutineFailed => {
                warn!(
                    id,
                    interval = ?interval(e),
                    func,
                    duration_ms = e.duration_ms,
                    err = reason,
                    "update metrics function failed"
                );
            }
            EventKind::RoutineTimedOut => {
                warn!(
                    id,
                    interval = ?interval(e),
                    func,
                    timeout_ms = e.duration_ms,
                    "update metrics function timed out"
                );
            }
            EventKind::RoutinePanicked => {
                error!(id, interval = ?interval(e), func, info = reason, "update metrics function panicked");
            }
            EventKind::RoutineUnknown => {
                warn!(func, interval = ?interval(e), "reload names an unknown update metrics function");
            }
            EventKind::ReloadApplied => {
                info!(summary = reason, "config: reload applied");
            }
            EventKind::RunnersCancelled => {
                info!(count = reason, "interval processes cancelled");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("all update metrics functions stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!(stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(subscriber = func, reason, "subscriber issue");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
