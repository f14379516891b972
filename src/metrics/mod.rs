//! # Published metrics.
//!
//! - [`SchedulerMetrics`] the scheduler's own per-routine duration/interval metrics
//! - [`Published`] atomic publication slot for routine-owned metric vectors
//!
//! Exposition (the `/metrics` endpoint) belongs to the embedding application: register
//! these collectors on its `prometheus::Registry`.

mod published;
mod scheduler;

pub use published::Published;
pub use scheduler::{DURATION_BUCKETS, SUBSYSTEM, SchedulerMetrics};
