//! Error types used by the scheduler runtime, collection routines and primitives.
//!
//! This module defines four error enums:
//!
//! - [`RuntimeError`] - errors raised by the scheduler runtime itself.
//! - [`RoutineError`] - errors raised by individual collection routine invocations.
//! - [`GateError`] - misuse of the [`BoundedGate`](crate::BoundedGate).
//! - [`CacheError`] - typed reads of cached values that do not match.
//!
//! All of them provide an `as_label` helper for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the scheduler runtime.
///
/// These represent failures of the scheduling system itself, never of a routine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `Scheduler::run` was called while another `run` is still active.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// Shutdown grace period was exceeded; some routine invocations were still in flight.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of routines that still had invocations in flight.
        stuck: Vec<String>,
    },

    /// Scheduler metrics could not be created or registered.
    #[error("metrics setup failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cadencevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Metrics(_) => "runtime_metrics",
        }
    }
}

/// # Errors produced by a collection routine invocation.
///
/// Any error withholds the duration metrics of that invocation; none of them stops
/// future ticks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RoutineError {
    /// Invocation exceeded the configured per-invocation timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Invocation failed (upstream error, bad cached value, ...).
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Invocation observed cancellation of its context and gave up.
    #[error("context cancelled")]
    Canceled,
}

impl RoutineError {
    /// Convenience constructor for [`RoutineError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        RoutineError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cadencevisor::RoutineError;
    /// use std::time::Duration;
    ///
    /// let err = RoutineError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "routine_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RoutineError::Timeout { .. } => "routine_timeout",
            RoutineError::Fail { .. } => "routine_failed",
            RoutineError::Canceled => "routine_canceled",
        }
    }
}

/// # Errors produced by the bounded concurrency gate.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GateError {
    /// More slots released than are currently admitted.
    ///
    /// The admission counter is left untouched.
    #[error("released {requested} slot(s) with only {outstanding} outstanding")]
    OverRelease {
        /// Admissions outstanding at the time of the call.
        outstanding: usize,
        /// Slots the caller tried to release.
        requested: usize,
    },

    /// An admission request that could never be satisfied.
    #[error("requested {requested} slot(s) from a gate of capacity {capacity}")]
    ExceedsCapacity {
        /// Slots the caller tried to acquire.
        requested: usize,
        /// Gate capacity.
        capacity: usize,
    },

    /// The gate was closed while waiting.
    #[error("gate closed")]
    Closed,
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::OverRelease { .. } => "gate_over_release",
            GateError::ExceedsCapacity { .. } => "gate_exceeds_capacity",
            GateError::Closed => "gate_closed",
        }
    }
}

/// # Errors produced by typed cache reads.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// The cached value under `key` is not of the requested type.
    #[error("cached value for {key:?} is not a {expected}")]
    TypeMismatch {
        /// Cache key.
        key: String,
        /// Requested type name.
        expected: &'static str,
    },
}

impl CacheError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CacheError::TypeMismatch { .. } => "cache_type_mismatch",
        }
    }
}

impl From<CacheError> for RoutineError {
    fn from(err: CacheError) -> Self {
        RoutineError::fail(err)
    }
}

impl From<GateError> for RoutineError {
    fn from(err: GateError) -> Self {
        RoutineError::fail(err)
    }
}
