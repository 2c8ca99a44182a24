//! Testing utilities for code built on normalized streams.
//!
//! - **Recording**: [`RecordingObserver`] captures every call it receives,
//!   optionally stamped with a scheduler's clock.
//! - **Assertions**: compare recorded items with expectations and check
//!   their spacing.
//!
//! Pair these with [`TestScheduler`](crate::scheduler::TestScheduler) to
//! drive time by hand.
//!
//! # Quick Start
//!
//! ```
//! use stream_normalize::*;
//! use stream_normalize::scheduler::TestScheduler;
//! use stream_normalize::testing::*;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let scheduler = TestScheduler::new();
//! let subject = PublishSubject::<u32, NormalizeError>::new();
//! let out = RecordingObserver::with_clock(scheduler.shared());
//! let _sub = subject
//!     .clone()
//!     .normalize_on(Duration::from_secs(1), scheduler.shared())?
//!     .subscribe_with(out.clone());
//!
//! for i in 0..3 {
//!     subject.on_next(i);
//! }
//! subject.on_completed();
//! scheduler.advance_time_by(Duration::from_secs(2));
//!
//! let (items, times, terminal) = split_recording(out.drain_events());
//! assert_items_in_order(&items, &[0, 1, 2]);
//! assert_min_spacing(&times.into_iter().flatten().collect::<Vec<_>>(), Duration::from_secs(1));
//! assert_eq!(terminal, Some(Terminal::Completed));
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod recording;

pub use assertions::*;
pub use recording::*;
