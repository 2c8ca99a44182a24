//! Error types for the normalize operator and its schedulers.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the operator itself, as opposed to errors travelling
/// through the stream from upstream.
///
/// When the operator has to fail a live subscription (the scheduler refused a
/// tick), the downstream error type is built from this through `From`, so
/// streams that carry `anyhow::Error` or a crate-local enum with a
/// `#[from] NormalizeError` variant work out of the box.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The window must be strictly positive.
    #[error("normalize window must be greater than zero (got {0:?})")]
    InvalidWindow(Duration),

    /// The scheduler refused to register the next window tick.
    #[error("scheduler rejected a window tick: {0}")]
    SchedulerRejected(#[from] SchedulerError),

    /// A scheduler could not be started.
    #[error("failed to start scheduler: {0}")]
    SchedulerStart(String),

    /// A configuration value is out of range.
    #[error("invalid normalize configuration: {0}")]
    InvalidConfig(String),
}

/// Why a [`Scheduler`](crate::scheduler::Scheduler) refused a registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The scheduler has been shut down and accepts no new work.
    #[error("scheduler is shut down")]
    Shutdown,
}
