//! Synchronization primitives for collection routines.
//!
//! - [`BoundedGate`] join-counter with an admission cap, for fan-out inside a routine.

mod gate;

pub use gate::{BoundedGate, GatePermit};
