//! # Scheduler metrics.
//!
//! Three vectors, all labeled only by `function` (the registered routine name):
//!
//! | name | type | set when |
//! |------|------|----------|
//! | `<ns>_update_metrics_function_duration_seconds` | histogram | invocation succeeded |
//! | `<ns>_update_metrics_function_last_duration_seconds` | gauge | invocation succeeded |
//! | `<ns>_update_metrics_function_interval_duration_seconds` | gauge | every tick |
//!
//! Failed invocations record nothing; a stale `last_duration` is the signal to alert on.

use std::time::Duration;

use prometheus::{GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

/// Fixed subsystem of every scheduler metric.
pub const SUBSYSTEM: &str = "update_metrics_function";

/// Histogram buckets (seconds) of the invocation duration histogram.
pub const DURATION_BUCKETS: [f64; 9] = [1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0];

const LABEL: &str = "function";

/// Duration and interval metrics of every scheduled routine.
///
/// Cheap to clone; clones share the underlying vectors.
#[derive(Clone)]
pub struct SchedulerMetrics {
    duration: HistogramVec,
    last_duration: GaugeVec,
    interval: GaugeVec,
}

impl SchedulerMetrics {
    /// Builds the vectors under `namespace` (fails only on an invalid metric name).
    pub fn new(namespace: &str) -> prometheus::Result<Self> {
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "duration_seconds",
                "Duration of update metrics functions (does not include run which returned an error)",
            )
            .namespace(namespace)
            .subsystem(SUBSYSTEM)
            .buckets(DURATION_BUCKETS.to_vec()),
            &[LABEL],
        )?;
        let last_duration = GaugeVec::new(
            Opts::new(
                "last_duration_seconds",
                "Last duration of update metrics functions (does not include run which returned an error)",
            )
            .namespace(namespace)
            .subsystem(SUBSYSTEM),
            &[LABEL],
        )?;
        let interval = GaugeVec::new(
            Opts::new("interval_duration_seconds", "Interval of update metrics functions")
                .namespace(namespace)
                .subsystem(SUBSYSTEM),
            &[LABEL],
        )?;
        Ok(Self {
            duration,
            last_duration,
            interval,
        })
    }

    /// Registers all three vectors on `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.duration.clone()))?;
        registry.register(Box::new(self.last_duration.clone()))?;
        registry.register(Box::new(self.interval.clone()))?;
        Ok(())
    }

    /// Records a successful invocation of `routine`.
    pub fn observe_success(&self, routine: &str, took: Duration) {
        let secs = took.as_secs_f64();
        self.duration.with_label_values(&[routine]).observe(secs);
        self.last_duration.with_label_values(&[routine]).set(secs);
    }

    /// Records the cadence `routine` is currently fired at.
    pub fn set_interval(&self, routine: &str, cadence: Duration) {
        self.interval
            .with_label_values(&[routine])
            .set(cadence.as_secs_f64());
    }

    /// Drops the interval series of a routine that is no longer scheduled.
    pub fn forget_interval(&self, routine: &str) {
        // Absent series is fine: the routine may never have ticked.
        let _ = self.interval.remove_label_values(&[routine]);
    }

    /// Invocation duration histogram, in seconds.
    pub fn duration_histogram(&self) -> &HistogramVec {
        &self.duration
    }

    /// Duration of the last successful invocation, in seconds.
    pub fn last_duration_gauge(&self) -> &GaugeVec {
        &self.last_duration
    }

    /// Configured cadence of each scheduled routine, in seconds.
    pub fn interval_gauge(&self) -> &GaugeVec {
        &self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_feeds_histogram_and_gauge() {
        let metrics = SchedulerMetrics::new("exporter").unwrap();
        metrics.observe_success("storage", Duration::from_millis(1_500));
        metrics.observe_success("storage", Duration::from_millis(500));

        let hist = metrics.duration_histogram().with_label_values(&["storage"]);
        assert_eq!(hist.get_sample_count(), 2);
        assert!((hist.get_sample_sum() - 2.0).abs() < 1e-9);
        let last = metrics.last_duration_gauge().with_label_values(&["storage"]).get();
        assert!((last - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_register_exposes_namespaced_families() {
        let registry = Registry::new();
        let metrics = SchedulerMetrics::new("exporter").unwrap();
        metrics.register(&registry).unwrap();
        metrics.set_interval("batch", Duration::from_secs(30));
        metrics.observe_success("batch", Duration::from_secs(2));

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|mf| mf.get_name().to_string())
            .collect();
        assert!(names.contains(&"exporter_update_metrics_function_duration_seconds".to_string()));
        assert!(names.contains(&"exporter_update_metrics_function_last_duration_seconds".to_string()));
        assert!(names.contains(&"exporter_update_metrics_function_interval_duration_seconds".to_string()));
    }

    #[test]
    fn test_forget_interval_drops_series() {
        let metrics = SchedulerMetrics::new("exporter").unwrap();
        metrics.set_interval("graph", Duration::from_secs(60));
        metrics.forget_interval("graph");
        metrics.forget_interval("never-ticked");

        let families = prometheus::core::Collector::collect(metrics.interval_gauge());
        assert!(families.iter().all(|mf| mf.get_metric().is_empty()));
    }

    #[test]
    fn test_invalid_namespace_is_rejected() {
        assert!(SchedulerMetrics::new("not a namespace").is_err());
    }
}
