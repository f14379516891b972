//! Runtime core: cadence groups, interval runners and their supervisor.
//!
//! The public API of this module is the [`Scheduler`] (built by [`SchedulerBuilder`]),
//! the [`CadenceRegistry`] routines are registered into, and the reload types.
//!
//! Internal modules:
//! - [`registry`]: routines grouped by cadence, plus the recall record;
//! - [`interval`]: one runner per cadence (wall-clock alignment, ticking, fan-out);
//! - [`runner`]: one invocation with timeout, panic containment, metrics and events;
//! - [`reload`]: desired-cadence tables diffed against the registry;
//! - [`supervisor`]: respawns runners, reloads, graceful shutdown;
//! - [`alive`]: in-flight invocation tracking for shutdown reports;
//! - [`shutdown`]: termination signal handling.

mod alive;
mod builder;
mod config;
mod interval;
mod registry;
mod reload;
mod runner;
mod shutdown;
mod supervisor;

pub use builder::SchedulerBuilder;
pub use config::SchedulerConfig;
pub use interval::{RunnerExit, alignment_delay};
pub use registry::CadenceRegistry;
pub use reload::{CadenceTable, ReloadReport};
pub use runner::correlation_id;
pub use supervisor::Scheduler;
