//! # stream-normalize
//!
//! A **leading-edge rate limiter** for push streams. `normalize` lets at most
//! one item through per fixed time window and never drops anything: items
//! arriving while a window is open wait in a FIFO queue and are released one
//! per subsequent window tick.
//!
//! ## Key Features
//!
//! - **Lowest latency for the first item** - an item arriving on an idle
//!   window goes straight through
//! - **No loss, no reordering** - every accepted item reaches downstream, in
//!   arrival order
//! - **Terminal signals wait their turn** - completion or an upstream error is
//!   held back until the queue has drained
//! - **Thread-safe** - producers and timer threads may race freely; the
//!   downstream observer still sees one call at a time
//! - **Deterministic tests** - a virtual-time [`TestScheduler`] and a
//!   [`RecordingObserver`](testing::RecordingObserver) ship with the crate
//!
//! ## Quick Start
//!
//! ```
//! use stream_normalize::*;
//! use stream_normalize::scheduler::TestScheduler;
//! use stream_normalize::testing::RecordingObserver;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let scheduler = TestScheduler::new();
//! let subject = PublishSubject::<&str, NormalizeError>::new();
//! let out = RecordingObserver::new();
//!
//! let sub = subject
//!     .clone()
//!     .normalize_on(Duration::from_secs(1), scheduler.shared())?
//!     .subscribe_with(out.clone());
//!
//! subject.on_next("a"); // idle window: delivered now
//! subject.on_next("b"); // window open: queued
//! subject.on_completed(); // queue non-empty: deferred
//! assert_eq!(out.take_next(), "a");
//! out.assert_no_more_events();
//!
//! scheduler.advance_time_by(Duration::from_secs(1));
//! assert_eq!(out.take_next(), "b");
//! out.assert_completed();
//! # drop(sub);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Window
//!
//! After every emission a window of fixed length opens. While it is open,
//! arriving items are queued. When it elapses a **tick** runs: it releases the
//! oldest queued item and opens the next window, or, if nothing is queued,
//! closes the window so the next arrival goes straight through again.
//!
//! ### Schedulers
//!
//! The operator only needs a clock and delayed callbacks, expressed by the
//! [`Scheduler`] trait:
//! - [`TestScheduler`] - virtual time for tests
//! - [`ThreadScheduler`] - wall-clock time, callbacks on a `rayon` pool
//! - [`scheduler::computation`] - a shared `ThreadScheduler`, the default
//!
//! ### Sources and observers
//!
//! [`Source`] and [`Observer`] are the minimal push-stream plumbing the
//! operator plugs into. [`PublishSubject`] and [`iter_source`] are provided as
//! upstreams; `normalize` itself returns a `Source`, so it composes.
//!
//! ## Module Overview
//!
//! - [`operator`] - [`Normalize`], [`Normalized`] and the [`NormalizeExt`] methods
//! - [`scheduler`] - the [`Scheduler`] trait and its implementations
//! - [`config`] - serializable [`NormalizeConfig`]
//! - `metrics` - counters describing operator activity (feature `metrics`,
//!   on by default)
//! - [`testing`] - recording observer and assertions
//! - [`queue`], [`terminal`], [`window`] - the pieces of the state machine

pub mod config;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod observer;
pub mod operator;
pub mod queue;
pub mod scheduler;
pub mod source;
pub mod subscription;
pub mod terminal;
pub mod testing;
pub mod window;

mod controller;
mod sink;
mod utils;

pub use config::NormalizeConfig;
pub use error::{NormalizeError, SchedulerError};
#[cfg(feature = "metrics")]
pub use metrics::{MetricsSnapshot, NormalizeMetrics};
pub use observer::{Notification, Observer, Terminal};
pub use operator::{Normalize, NormalizeExt, Normalized};
pub use queue::PendingQueue;
pub use scheduler::{Scheduler, TestScheduler, ThreadScheduler, TimerHandle};
pub use source::{IterSource, PublishSubject, Source, iter_source};
pub use subscription::{CancellationToken, Subscription};
pub use terminal::TerminalCoordinator;
pub use window::WindowState;
