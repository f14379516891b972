//! # Event subscribers for the scheduler runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   run_once ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet::emit
//!                                                                     │
//!                                                          ┌──────────┼──────────┐
//!                                                          ▼          ▼          ▼
//!                                                      LogWriter   Custom      ...
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscriber::Subscribe;
