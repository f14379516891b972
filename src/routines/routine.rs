//! # Routine abstraction.
//!
//! A [`Routine`] is an opaque unit of work: given a [`RoutineContext`] it runs to
//! completion or fails. Identity (the name) belongs to the registry, not to the routine.
//!
//! The common handle type is [`RoutineRef`], an `Arc<dyn Routine>` suitable for sharing
//! across cadence buckets and concurrent invocations.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RoutineError;
use crate::routines::RoutineContext;

/// Boxed future returned by [`Routine::run`].
pub type BoxRoutineFuture = Pin<Box<dyn Future<Output = Result<(), RoutineError>> + Send + 'static>>;

/// Shared handle to a routine.
pub type RoutineRef = Arc<dyn Routine>;

/// # Asynchronous, cancelable collection routine.
///
/// Every tick of the routine's cadence calls [`run`](Routine::run) once. Invocations may
/// overlap when a run outlives its interval, so implementations must be safe to run
/// concurrently with themselves: keep per-run state inside the returned future and only
/// touch shared state through an atomic publish.
///
/// # Example
/// ```
/// use cadencevisor::{BoxRoutineFuture, Routine, RoutineContext};
///
/// struct Noop;
///
/// impl Routine for Noop {
///     fn run(&self, ctx: RoutineContext) -> BoxRoutineFuture {
///         Box::pin(async move {
///             if ctx.is_cancelled() {
///                 return Ok(());
///             }
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Routine: Send + Sync + 'static {
    /// Starts one invocation.
    ///
    /// Implementations should check `ctx.is_cancelled()` periodically; apart from the
    /// optional per-invocation timeout, the scheduler never drops a running invocation.
    fn run(&self, ctx: RoutineContext) -> BoxRoutineFuture;
}
