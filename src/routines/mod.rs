//! # Collection routine abstractions.
//!
//! This module provides the routine-related types:
//! - [`Routine`] - trait for implementing cancelable collection routines
//! - [`RoutineFn`] - function-based routine implementation
//! - [`RoutineRef`] - shared reference to a routine (`Arc<dyn Routine>`)
//! - [`RoutineContext`] - per-invocation execution context (token + correlation id)

mod context;
mod routine;
mod routine_fn;

pub use context::RoutineContext;
pub use routine::{BoxRoutineFuture, Routine, RoutineRef};
pub use routine_fn::RoutineFn;
