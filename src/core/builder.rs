use std::sync::Arc;

use prometheus::Registry;

use super::{config::SchedulerConfig, registry::CadenceRegistry, supervisor::Scheduler};
use crate::{
    cache::CacheRegistry,
    error::RuntimeError,
    events::Bus,
    metrics::SchedulerMetrics,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Scheduler`] with optional collaborators.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    cadence_registry: Option<Arc<CadenceRegistry>>,
    metrics_registry: Option<Registry>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            cadence_registry: None,
            metrics_registry: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (runner lifecycle, invocation outcomes,
    /// reloads, ...) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an existing cadence registry (e.g. one routines were registered into at startup).
    ///
    /// Without it, the scheduler creates an empty one at `cfg.default_cadence`.
    pub fn with_cadence_registry(mut self, registry: Arc<CadenceRegistry>) -> Self {
        self.cadence_registry = Some(registry);
        self
    }

    /// Registers the scheduler metrics into `registry` on build.
    pub fn with_metrics_registry(mut self, registry: Registry) -> Self {
        self.metrics_registry = Some(registry);
        self
    }

    /// Builds and returns the Scheduler instance.
    ///
    /// Must be called from within a tokio runtime (subscriber workers are spawned here).
    ///
    /// Fails with [`RuntimeError::Metrics`] if the metrics namespace is invalid or the
    /// metrics collide with ones already in the metrics registry.
    pub fn build(self) -> Result<Arc<Scheduler>, RuntimeError> {
        let metrics = SchedulerMetrics::new(&self.cfg.metrics_namespace)?;
        if let Some(registry) = &self.metrics_registry {
            metrics.register(registry)?;
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let registry = self
            .cadence_registry
            .unwrap_or_else(|| Arc::new(CadenceRegistry::new(self.cfg.default_cadence)));
        let caches = Arc::new(CacheRegistry::new(self.cfg.cache_sweep, self.cfg.no_cache));

        Ok(Arc::new(Scheduler::new_internal(
            self.cfg, bus, subs, registry, caches, metrics,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_build_uses_config() {
        let mut cfg = SchedulerConfig::default();
        cfg.default_cadence = Duration::from_secs(45);
        cfg.no_cache = true;

        let sched = SchedulerBuilder::new(cfg).build().unwrap();
        assert_eq!(sched.registry().default_cadence(), Duration::from_secs(45));
        assert!(sched.caches().is_noop());
    }

    #[tokio::test]
    async fn test_shared_cadence_registry() {
        let registry = Arc::new(CadenceRegistry::default());
        let sched = SchedulerBuilder::new(SchedulerConfig::default())
            .with_cadence_registry(registry.clone())
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(sched.registry(), &registry));
    }

    #[tokio::test]
    async fn test_duplicate_metrics_registration_fails() {
        let prom = Registry::new();
        SchedulerBuilder::new(SchedulerConfig::default())
            .with_metrics_registry(prom.clone())
            .build()
            .unwrap();

        let err = SchedulerBuilder::new(SchedulerConfig::default())
            .with_metrics_registry(prom)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "runtime_metrics");
    }
}
