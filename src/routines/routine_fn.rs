//! # Function-backed routine (`RoutineFn`)
//!
//! [`RoutineFn`] wraps a closure `F: Fn(RoutineContext) -> Fut`, producing a fresh
//! future per invocation. Concurrent invocations therefore never share hidden state;
//! anything shared must be captured explicitly (e.g. an `Arc<Published<_>>`).
//!
//! ## Example
//! ```rust
//! use cadencevisor::{RoutineContext, RoutineError, RoutineFn, RoutineRef};
//!
//! let r: RoutineRef = RoutineFn::arc(|ctx: RoutineContext| async move {
//!     if ctx.is_cancelled() {
//!         return Err(RoutineError::Canceled);
//!     }
//!     Ok(())
//! });
//! # let _ = r;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::RoutineError;
use crate::routines::{BoxRoutineFuture, Routine, RoutineContext};

/// Function-backed routine implementation.
pub struct RoutineFn<F> {
    f: F,
}

impl<F> RoutineFn<F> {
    /// Creates a new function-backed routine.
    ///
    /// Prefer [`RoutineFn::arc`] when you immediately need a [`RoutineRef`](crate::RoutineRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the routine and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Routine for RoutineFn<F>
where
    F: Fn(RoutineContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RoutineError>> + Send + 'static,
{
    fn run(&self, ctx: RoutineContext) -> BoxRoutineFuture {
        Box::pin((self.f)(ctx))
    }
}
