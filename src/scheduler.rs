//! Time and delayed execution.
//!
//! The operator only needs three things from a scheduler: the current
//! monotonic time, a way to run a callback after a delay, and a way to cancel
//! that callback. [`Scheduler`] captures exactly that.
//!
//! Implementations:
//! - [`TestScheduler`]: virtual time, advanced explicitly by tests.
//! - [`ThreadScheduler`]: wall-clock time; one timer thread hands due
//!   callbacks to a `rayon` worker pool.
//!
//! [`computation`] returns a process-wide `ThreadScheduler` sized to the
//! machine, used by the convenience constructors.

pub mod thread;
pub mod virtual_time;

pub use thread::ThreadScheduler;
pub use virtual_time::TestScheduler;

use crate::error::{NormalizeError, SchedulerError};
use crate::subscription::CancellationToken;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// A unit of delayed work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Clock plus delayed-callback capability.
pub trait Scheduler: Send + Sync {
    /// Monotonic time since this scheduler's epoch.
    fn now(&self) -> Duration;

    /// Run `task` once, no earlier than `delay` from now.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Shutdown`] if the scheduler no longer accepts
    /// work.
    fn schedule_after(&self, delay: Duration, task: Task) -> Result<TimerHandle, SchedulerError>;
}

/// Cancellation handle for one scheduled task.
///
/// Cancelling is idempotent and best effort: a task that has already started
/// keeps running, which is why callers also guard their own state.
#[derive(Clone, Debug, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

static COMPUTATION: OnceLock<Result<Arc<ThreadScheduler>, NormalizeError>> = OnceLock::new();

/// Shared wall-clock scheduler with one worker per CPU.
///
/// # Errors
///
/// Returns [`NormalizeError::SchedulerStart`] if the timer thread or the
/// worker pool could not be created. The outcome is cached.
pub fn computation() -> Result<Arc<dyn Scheduler>, NormalizeError> {
    let scheduler = COMPUTATION
        .get_or_init(|| ThreadScheduler::new(num_cpus::get().max(1)).map(Arc::new))
        .clone()?;
    Ok(scheduler as Arc<dyn Scheduler>)
}
