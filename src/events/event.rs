//! # Runtime events emitted by the scheduler, its runners and routine invocations.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Runner events**: interval runner lifecycle (starting, aligned, cancelled)
//! - **Routine events**: one invocation's outcome (starting, succeeded, failed, ...)
//! - **Management events**: reloads and blanket runner cancellation
//! - **Shutdown / subscriber events**: grace handling and subscriber isolation
//!
//! The [`Event`] struct carries metadata such as timestamps, routine name, cadence,
//! correlation id and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cadencevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RoutineFailed)
//!     .with_routine("storage")
//!     .with_correlation("1a2b3c4d")
//!     .with_cadence(Duration::from_secs(60))
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::RoutineFailed);
//! assert_eq!(ev.routine.as_deref(), Some("storage"));
//! assert_eq!(ev.cadence_ms, Some(60_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `routine` (subscriber name) and `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `routine` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All in-flight invocations finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some invocations were still running.
    ///
    /// Sets `reason` (stuck routine names).
    GraceExceeded,

    // === Runner events ===
    /// Interval runner spawned for a cadence.
    ///
    /// Sets `cadence_ms`.
    RunnerStarting,

    /// Runner finished its wall-clock alignment wait and is about to tick.
    ///
    /// Sets `cadence_ms` and `duration_ms` (the alignment wait).
    RunnerAligned,

    /// Runner observed cancellation and exited.
    ///
    /// Sets `cadence_ms`; `reason` is `"aligning"` or `"ticking"`.
    RunnerCancelled,

    // === Routine events ===
    /// One invocation is starting.
    ///
    /// Sets `routine`, `cadence_ms`, `correlation`.
    RoutineStarting,

    /// Invocation completed successfully; duration metrics were recorded.
    ///
    /// Sets `routine`, `cadence_ms`, `correlation`, `duration_ms`.
    RoutineSucceeded,

    /// Invocation returned an error; duration metrics were withheld.
    ///
    /// Sets `routine`, `cadence_ms`, `correlation`, `duration_ms`, `reason`.
    RoutineFailed,

    /// Invocation exceeded the configured timeout (always followed by `RoutineFailed`).
    ///
    /// Sets `routine`, `cadence_ms`, `correlation`, `duration_ms` (the timeout).
    RoutineTimedOut,

    /// Invocation panicked; the panic was contained.
    ///
    /// Sets `routine`, `cadence_ms`, `correlation`, `reason`.
    RoutinePanicked,

    /// A reload named a routine that was never registered.
    ///
    /// Sets `routine`, `cadence_ms` (the desired cadence).
    RoutineUnknown,

    // === Management events ===
    /// A reload was applied to the registry.
    ///
    /// Sets `reason` (summary of enabled/moved/disabled counts).
    ReloadApplied,

    /// Every tracked interval runner was cancelled.
    ///
    /// Sets `reason` (number of runners cancelled).
    RunnersCancelled,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Registered routine name (or subscriber name for subscriber events).
    pub routine: Option<Arc<str>>,
    /// Cadence of the runner involved, in milliseconds.
    pub cadence_ms: Option<u64>,
    /// Measured duration (invocation, alignment wait or timeout) in milliseconds.
    pub duration_ms: Option<u64>,
    /// Correlation id of the invocation.
    pub correlation: Option<Arc<str>>,
    /// Human-readable reason (errors, summaries, etc.).
    pub reason: Option<Arc<str>>,
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            routine: None,
            cadence_ms: None,
            duration_ms: None,
            correlation: None,
            reason: None,
        }
    }

    /// Attaches a routine name.
    #[inline]
    pub fn with_routine(mut self, routine: impl Into<Arc<str>>) -> Self {
        self.routine = Some(routine.into());
        self
    }

    /// Attaches a cadence (stored as milliseconds).
    #[inline]
    pub fn with_cadence(mut self, d: Duration) -> Self {
        self.cadence_ms = Some(millis(d));
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration_ms = Some(millis(d));
        self
    }

    /// Attaches a correlation id.
    #[inline]
    pub fn with_correlation(mut self, id: impl Into<Arc<str>>) -> Self {
        self.correlation = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_routine(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_routine(subscriber)
            .with_reason(info)
    }

    /// True for events the subscriber set publishes about itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
