//! # Atomic publication of routine-owned metric vectors.
//!
//! A routine never mutates the vector readers scrape. Each invocation builds a fresh
//! working copy, fills it, and on success publishes it with a single pointer swap:
//!
//! ```text
//! invocation:  working = published.working_copy()?   (exclusively owned)
//!              ... populate working ...
//!              published.publish(working)             (one ArcSwap store)
//!
//! scrape:      published.collect()                    (one ArcSwap load)
//! ```
//!
//! Readers therefore see either the previous snapshot or the new one, never a mix; a
//! failed invocation simply drops its working copy and the last good snapshot stays.
//! Overlapping invocations of the same routine each own their working copy; the last to
//! publish wins.

use std::sync::Arc;

use arc_swap::ArcSwap;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;

type Factory<C> = dyn Fn() -> prometheus::Result<C> + Send + Sync;

struct Inner<C> {
    template: C,
    current: ArcSwap<C>,
    factory: Box<Factory<C>>,
}

/// Publication slot for a metric collector of shape `C`.
///
/// Implements [`Collector`] itself: register it once and every scrape reads the
/// currently published snapshot. Cheap to clone; clones share the slot.
pub struct Published<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Published<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Collector + 'static> Published<C> {
    /// Creates the slot; `factory` builds an empty collector of the published shape.
    ///
    /// The initial snapshot is an empty collector.
    pub fn new<F>(factory: F) -> prometheus::Result<Self>
    where
        F: Fn() -> prometheus::Result<C> + Send + Sync + 'static,
    {
        let template = factory()?;
        let current = ArcSwap::from_pointee(factory()?);
        Ok(Self {
            inner: Arc::new(Inner {
                template,
                current,
                factory: Box::new(factory),
            }),
        })
    }

    /// Fresh, unpublished collector of the same shape.
    pub fn working_copy(&self) -> prometheus::Result<C> {
        (self.inner.factory)()
    }

    /// Replaces the published snapshot with `next`.
    pub fn publish(&self, next: C) {
        self.inner.current.store(Arc::new(next));
    }

    /// Currently published snapshot.
    pub fn snapshot(&self) -> Arc<C> {
        self.inner.current.load_full()
    }

    /// Registers the slot on `registry`.
    pub fn register(&self, registry: &prometheus::Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.clone()))
    }
}

impl<C: Collector + 'static> Collector for Published<C> {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.template.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.inner.current.load().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{GaugeVec, Opts, Registry};

    fn blob_count() -> prometheus::Result<GaugeVec> {
        GaugeVec::new(
            Opts::new("blob_count", "Blobs per container").namespace("storage"),
            &["account", "container"],
        )
    }

    fn sample(vec: &GaugeVec, container: &str) -> Option<f64> {
        vec.collect()
            .first()
            .and_then(|mf| {
                mf.get_metric().iter().find(|m| {
                    m.get_label()
                        .iter()
                        .any(|l| l.get_name() == "container" && l.get_value() == container)
                })
            })
            .map(|m| m.get_gauge().get_value())
    }

    #[test]
    fn test_working_copy_is_invisible_until_published() {
        let published = Published::new(blob_count).unwrap();

        let first = published.working_copy().unwrap();
        first.with_label_values(&["acc", "logs"]).set(3.0);
        published.publish(first);
        assert_eq!(sample(&published.snapshot(), "logs"), Some(3.0));

        let second = published.working_copy().unwrap();
        second.with_label_values(&["acc", "logs"]).set(7.0);
        second.with_label_values(&["acc", "images"]).set(1.0);

        // In-flight run: readers still see only the previous snapshot.
        let seen = published.snapshot();
        assert_eq!(sample(&seen, "logs"), Some(3.0));
        assert_eq!(sample(&seen, "images"), None);

        published.publish(second);
        let seen = published.snapshot();
        assert_eq!(sample(&seen, "logs"), Some(7.0));
        assert_eq!(sample(&seen, "images"), Some(1.0));
    }

    #[test]
    fn test_concurrent_scrapes_never_see_a_partial_run() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let published = Published::new(blob_count).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let scraper = {
            let published = published.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut reads = 0usize;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let seen = published.snapshot();
                    assert_eq!(sample(&seen, "logs"), sample(&seen, "images"));
                    reads += 1;
                    if finished {
                        return reads;
                    }
                }
            })
        };

        for i in 0..200 {
            let working = published.working_copy().unwrap();
            working.with_label_values(&["acc", "logs"]).set(f64::from(i));
            thread::yield_now();
            working.with_label_values(&["acc", "images"]).set(f64::from(i));
            published.publish(working);
        }
        done.store(true, Ordering::Release);

        let reads = scraper.join().unwrap();
        assert!(reads >= 1);
        assert_eq!(sample(&published.snapshot(), "images"), Some(199.0));
    }

    #[test]
    fn test_failed_run_keeps_previous_snapshot() {
        let published = Published::new(blob_count).unwrap();
        let good = published.working_copy().unwrap();
        good.with_label_values(&["acc", "logs"]).set(3.0);
        published.publish(good);

        let abandoned = published.working_copy().unwrap();
        abandoned.with_label_values(&["acc", "logs"]).set(99.0);
        drop(abandoned);

        assert_eq!(sample(&published.snapshot(), "logs"), Some(3.0));
    }

    #[test]
    fn test_registered_slot_scrapes_current_snapshot() {
        let registry = Registry::new();
        let published = Published::new(blob_count).unwrap();
        published.register(&registry).unwrap();

        let next = published.working_copy().unwrap();
        next.with_label_values(&["acc", "logs"]).set(5.0);
        published.publish(next);

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "storage_blob_count");
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 5.0);
    }
}
