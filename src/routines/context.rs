//! # Per-invocation routine context.
//!
//! [`RoutineContext`] is what a routine receives on every tick: a cancellation token
//! derived from its interval runner, the correlation id used in its log lines, and the
//! tick metadata.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

/// Execution context handed to a single routine invocation.
///
/// Cheap to clone; clones share the same token.
#[derive(Clone, Debug)]
pub struct RoutineContext {
    token: CancellationToken,
    id: Arc<str>,
    name: Arc<str>,
    cadence: Duration,
    tick: SystemTime,
}

impl RoutineContext {
    /// Builds a context for one invocation of `name` fired at `tick`.
    pub fn new(
        token: CancellationToken,
        id: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        cadence: Duration,
        tick: SystemTime,
    ) -> Self {
        Self {
            token,
            id: id.into(),
            name: name.into(),
            cadence,
            tick,
        }
    }

    /// Detached context for calling a routine outside of the scheduler (tests, one-shot runs).
    pub fn detached(name: impl Into<Arc<str>>) -> Self {
        Self::new(
            CancellationToken::new(),
            "00000000",
            name,
            Duration::ZERO,
            SystemTime::now(),
        )
    }

    /// Correlation id of this invocation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registered name of the routine being invoked.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cadence the routine was fired at.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Wall-clock time of the tick that fired this invocation.
    pub fn tick(&self) -> SystemTime {
        self.tick
    }

    /// True once the owning runner was cancelled (reload, shutdown) or the invocation timed out.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Underlying token, for composing with other cancellable APIs.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
