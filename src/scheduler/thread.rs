//! Wall-clock scheduler: one timer thread, a `rayon` pool for callbacks.

use super::{Scheduler, Task, TimerHandle};
use crate::error::{NormalizeError, SchedulerError};
use crate::utils::lock;
use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Real-time scheduler.
///
/// A dedicated timer thread sleeps until the earliest deadline and hands due
/// tasks to a `rayon` thread pool, so a slow callback never delays the timer.
/// Dropping the scheduler (or calling [`shutdown`](Self::shutdown)) discards
/// pending tasks and rejects new ones.
pub struct ThreadScheduler {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    epoch: Instant,
    state: Mutex<TimerQueue>,
    wakeup: Condvar,
    pool: rayon::ThreadPool,
}

#[derive(Default)]
struct TimerQueue {
    entries: BTreeMap<(Instant, u64), (TimerHandle, Task)>,
    seq: u64,
    shutdown: bool,
}

impl ThreadScheduler {
    /// Start a scheduler whose callbacks run on `workers` pool threads.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::SchedulerStart`] if `workers` is zero or a
    /// thread cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, NormalizeError> {
        if workers == 0 {
            return Err(NormalizeError::SchedulerStart(
                "worker pool needs at least one thread".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("normalize-worker-{i}"))
            .panic_handler(|_| error!("scheduled task panicked"))
            .build()
            .map_err(|e| NormalizeError::SchedulerStart(e.to_string()))?;

        let shared = Arc::new(Shared {
            epoch: Instant::now(),
            state: Mutex::new(TimerQueue::default()),
            wakeup: Condvar::new(),
            pool,
        });

        let timer_shared = Arc::clone(&shared);
        let timer = std::thread::Builder::new()
            .name("normalize-timer".into())
            .spawn(move || run_timer(&timer_shared))
            .map_err(|e| NormalizeError::SchedulerStart(e.to_string()))?;

        debug!(workers, "thread scheduler started");
        Ok(Self { shared, timer: Mutex::new(Some(timer)) })
    }

    /// Stop the timer thread and drop every pending task. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut q = lock(&self.shared.state);
            if q.shutdown {
                return;
            }
            q.shutdown = true;
            q.entries.clear();
        }
        self.shared.wakeup.notify_all();
        if let Some(timer) = lock(&self.timer).take() {
            // The timer thread never runs tasks itself, so it cannot be the
            // caller here.
            let _ = timer.join();
        }
        debug!("thread scheduler shut down");
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        lock(&self.shared.state).shutdown
    }

    /// Scheduled tasks that are neither cancelled nor dispatched yet.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        lock(&self.shared.state)
            .entries
            .values()
            .filter(|(handle, _)| !handle.is_cancelled())
            .count()
    }
}

fn run_timer(shared: &Shared) {
    let mut q = lock(&shared.state);
    loop {
        if q.shutdown {
            return;
        }
        let now = Instant::now();
        let next_due = q.entries.first_key_value().map(|(&(due, _), _)| due);
        match next_due {
            Some(due) if due <= now => {
                if let Some((_, (handle, task))) = q.entries.pop_first() {
                    if !handle.is_cancelled() {
                        shared.pool.spawn(move || {
                            if !handle.is_cancelled() {
                                task();
                            }
                        });
                    }
                }
            }
            Some(due) => {
                q = shared
                    .wakeup
                    .wait_timeout(q, due - now)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
            }
            None => {
                q = shared.wakeup.wait(q).unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn now(&self) -> Duration {
        self.shared.epoch.elapsed()
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> Result<TimerHandle, SchedulerError> {
        let handle = TimerHandle::new();
        {
            let mut q = lock(&self.shared.state);
            if q.shutdown {
                return Err(SchedulerError::Shutdown);
            }
            let seq = q.seq;
            q.seq += 1;
            q.entries.insert((deadline_after(delay), seq), (handle.clone(), task));
        }
        self.shared.wakeup.notify_one();
        Ok(handle)
    }
}

/// `now + delay`, clamped to a far-future instant when the sum is not
/// representable.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Roughly thirty years; far enough that such a task never fires.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
