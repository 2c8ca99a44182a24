//! Virtual-time scheduler for deterministic tests.

use super::{Scheduler, Task, TimerHandle};
use crate::error::SchedulerError;
use crate::utils::lock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A scheduler whose clock only moves when told to.
///
/// Tasks due at the same instant run in the order they were scheduled. Tasks
/// scheduled by a running task are eligible within the same advance if they
/// fall due before its target, so advancing by three windows drains three
/// buffered items.
///
/// # Example
///
/// ```
/// use stream_normalize::scheduler::{Scheduler, TestScheduler};
/// use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
/// use std::time::Duration;
///
/// let scheduler = TestScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let f = Arc::clone(&fired);
/// scheduler
///     .schedule_after(Duration::from_secs(1), Box::new(move || f.store(true, Ordering::SeqCst)))
///     .unwrap();
///
/// scheduler.advance_time_by(Duration::from_millis(999));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance_time_by(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Default)]
pub struct TestScheduler {
    inner: Arc<Mutex<VirtualClock>>,
}

#[derive(Default)]
struct VirtualClock {
    now: Duration,
    seq: u64,
    queue: BTreeMap<(Duration, u64), (TimerHandle, Task)>,
    shutdown: bool,
}

impl TestScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle usable wherever an `Arc<dyn Scheduler>` is expected.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Scheduler> {
        Arc::new(self.clone())
    }

    /// Move the clock forward by `delta`, running every task that falls due.
    pub fn advance_time_by(&self, delta: Duration) {
        let target = lock(&self.inner).now.saturating_add(delta);
        self.advance_time_to(target);
    }

    /// Move the clock to `target`, running every task due at or before it.
    /// A target in the past only runs what is already due.
    pub fn advance_time_to(&self, target: Duration) {
        loop {
            let (handle, task) = {
                let mut clock = lock(&self.inner);
                let due = match clock.queue.first_key_value() {
                    Some((&(due, _), _)) if due <= target.max(clock.now) => due,
                    _ => break,
                };
                clock.now = clock.now.max(due);
                match clock.queue.pop_first() {
                    Some((_, entry)) => entry,
                    None => break,
                }
            };
            // The clock lock is released so the task can schedule more work.
            if !handle.is_cancelled() {
                task();
            }
        }
        let mut clock = lock(&self.inner);
        clock.now = clock.now.max(target);
    }

    /// Run every task already due at the current time.
    pub fn trigger_actions(&self) {
        let now = lock(&self.inner).now;
        self.advance_time_to(now);
    }

    /// Move the clock without running anything, modelling a timer thread that
    /// is late. Follow with [`trigger_actions`](Self::trigger_actions).
    pub fn advance_clock_by(&self, delta: Duration) {
        let mut clock = lock(&self.inner);
        clock.now = clock.now.saturating_add(delta);
    }

    /// Refuse all future registrations. Already scheduled tasks still run.
    pub fn shutdown(&self) {
        lock(&self.inner).shutdown = true;
    }

    /// Scheduled tasks that are neither cancelled nor run yet.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        lock(&self.inner)
            .queue
            .values()
            .filter(|(handle, _)| !handle.is_cancelled())
            .count()
    }
}

impl Scheduler for TestScheduler {
    fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> Result<TimerHandle, SchedulerError> {
        let mut clock = lock(&self.inner);
        if clock.shutdown {
            return Err(SchedulerError::Shutdown);
        }
        // A delay past the end of virtual time never fires.
        let due = clock.now.saturating_add(delay);
        let seq = clock.seq;
        clock.seq += 1;
        let handle = TimerHandle::new();
        clock.queue.insert((due, seq), (handle.clone(), task));
        Ok(handle)
    }
}
