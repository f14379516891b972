//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the scheduler, interval runners
//! and per-tick routine invocations.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` (reload, shutdown), `IntervalRunner` (aligning,
//!   cancellation), `runner::run_once` (routine outcome).
//! - **Consumers**: `Scheduler::subscriber_listener()` which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
