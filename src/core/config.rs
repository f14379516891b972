//! # Scheduler runtime configuration.
//!
//! Provides [`SchedulerConfig`] centralized settings for the scheduler runtime.
//!
//! Config is used by [`SchedulerBuilder`](crate::SchedulerBuilder) to size the event bus,
//! build the cadence registry, the cache registry and the metrics.
//!
//! ## Sentinel values
//! - `routine_timeout = 0s` → no per-invocation timeout
//! - `cache_sweep = 0s` → caches never sweep (expired entries still read as absent)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Global configuration for the scheduler runtime.
///
/// ## Field semantics
/// - `default_cadence`: cadence used by `CadenceRegistry::register`
/// - `idle_poll`: how long the supervisor idles when no cadence has routines
/// - `grace`: how long shutdown waits for in-flight invocations
/// - `routine_timeout`: per-invocation timeout (`0s` = none)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `cache_sweep`: expiry sweep period of every TTL cache
/// - `no_cache`: hand out no-op caches, disabling caching without touching call sites
/// - `metrics_namespace`: prometheus namespace of the scheduler metrics
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Cadence of routines registered without an explicit one.
    pub default_cadence: Duration,

    /// Supervisor re-check period while the registry has no live cadence.
    ///
    /// Covers routines registered after the supervisor started.
    pub idle_poll: Duration,

    /// Maximum time to wait for in-flight invocations on shutdown.
    ///
    /// Exceeding it makes `Scheduler::run` return `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Per-invocation timeout.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = the invocation's context is cancelled and the run counts as failed
    pub routine_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Expiry sweep period of every cache handed out by the cache registry.
    pub cache_sweep: Duration,

    /// Disable caching (every cache is a `NoopCache`).
    pub no_cache: bool,

    /// Namespace prefix of the scheduler metrics.
    pub metrics_namespace: String,
}

impl SchedulerConfig {
    /// Returns the per-invocation timeout as an `Option`.
    #[inline]
    pub fn routine_timeout(&self) -> Option<Duration> {
        if self.routine_timeout == Duration::ZERO {
            None
        } else {
            Some(self.routine_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `default_cadence = 30s`
    /// - `idle_poll = 1s`
    /// - `grace = 60s`
    /// - `routine_timeout = 0s` (no timeout)
    /// - `bus_capacity = 1024`
    /// - `cache_sweep = 2min`
    /// - `no_cache = false`
    /// - `metrics_namespace = "exporter"`
    fn default() -> Self {
        Self {
            default_cadence: Duration::from_secs(30),
            idle_poll: Duration::from_secs(1),
            grace: Duration::from_secs(60),
            routine_timeout: Duration::ZERO,
            bus_capacity: 1024,
            cache_sweep: Duration::from_secs(120),
            no_cache: false,
            metrics_namespace: "exporter".to_string(),
        }
    }
}
