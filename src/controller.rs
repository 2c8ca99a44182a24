//! The per-subscription state machine.
//!
//! ```text
//!            item / forward, schedule tick
//!   Idle ───────────────────────────────────▶ Open
//!    ▲                                         │ item / enqueue
//!    │ tick, queue empty                       │ tick, queue non-empty /
//!    └─────────────────────────────────────────┘   forward oldest, reschedule
//! ```
//!
//! Every transition runs under one mutex: the decision and its side effects
//! (queue mutation, timer scheduling or cancelling, offering to the sink) are
//! a single atomic step. Actual downstream calls happen after the lock is
//! released, through the [`SerializedSink`].
//!
//! A terminal signal goes straight through when nothing is queued, otherwise
//! it waits in the [`TerminalCoordinator`] until the tick that empties the
//! queue.
//!
//! Ties: if an item or terminal arrives while the outstanding tick is already
//! due (`now >= deadline`) but has not run, the tick is performed inline
//! first. A tick due at `t` therefore always beats an arrival at `t`,
//! independent of how the scheduler's threads race.

use crate::error::{NormalizeError, SchedulerError};
#[cfg(feature = "metrics")]
use crate::metrics::NormalizeMetrics;
use crate::observer::{Observer, Terminal};
use crate::queue::PendingQueue;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::sink::SerializedSink;
use crate::subscription::{CancellationToken, Subscription};
use crate::terminal::TerminalCoordinator;
use crate::utils::lock;
use crate::window::WindowState;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// What a controller reports its activity into.
#[cfg(feature = "metrics")]
pub(crate) type MetricsHandle = Option<NormalizeMetrics>;
#[cfg(not(feature = "metrics"))]
pub(crate) type MetricsHandle = ();

/// Report into the controller's metrics, if any are attached.
macro_rules! record {
    ($self:ident, $hook:ident $(, $arg:expr)?) => {
        #[cfg(feature = "metrics")]
        if let Some(m) = &$self.metrics {
            m.$hook($($arg)?);
        }
    };
}

pub(crate) struct WindowController<T, E, O> {
    window: Duration,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<ControllerState<T, E>>,
    sink: SerializedSink<T, E, O>,
    cancelled: CancellationToken,
    /// Set once the instance has reached its end, for whatever reason.
    done: CancellationToken,
    upstream: Mutex<Upstream>,
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    metrics: MetricsHandle,
    this: Weak<Self>,
}

/// The upstream subscription, which only exists once `subscribe` on the
/// source has returned.
enum Upstream {
    Pending,
    Attached(Subscription),
    Detached,
}

struct ControllerState<T, E> {
    window: WindowState,
    queue: PendingQueue<T>,
    terminal: TerminalCoordinator<E>,
    timer: Option<TimerHandle>,
    /// Identifies the one tick allowed to act; anything older is stale.
    generation: u64,
    finished: bool,
}

impl<T, E, O> WindowController<T, E, O>
where
    T: Send + 'static,
    E: From<NormalizeError> + Send + 'static,
    O: Observer<T, E> + 'static,
{
    pub(crate) fn new(
        window: Duration,
        scheduler: Arc<dyn Scheduler>,
        downstream: O,
        metrics: MetricsHandle,
    ) -> Arc<Self> {
        let cancelled = CancellationToken::new();
        Arc::new_cyclic(|this| Self {
            window,
            scheduler,
            state: Mutex::new(ControllerState {
                window: WindowState::Idle,
                queue: PendingQueue::new(),
                terminal: TerminalCoordinator::new(),
                timer: None,
                generation: 0,
                finished: false,
            }),
            sink: SerializedSink::new(downstream, cancelled.clone()),
            cancelled,
            done: CancellationToken::new(),
            upstream: Mutex::new(Upstream::Pending),
            metrics,
            this: this.clone(),
        })
    }

    /// Upstream `on_next`.
    pub(crate) fn on_next(&self, item: T) {
        {
            let mut st = lock(&self.state);
            if self.cancelled.is_cancelled() {
                return;
            }
            if st.terminal.is_set() {
                warn!("item received after a terminal signal; dropping it");
                return;
            }
            if st.finished {
                return;
            }
            record!(self, item_received);
            self.settle_due_tick(&mut st);

            if !st.finished {
                match st.window {
                    WindowState::Idle => {
                        self.sink.forward(item);
                        record!(self, forwarded_immediately);
                        self.open_window(&mut st);
                    }
                    WindowState::Open { .. } => {
                        let depth = st.queue.push_back(item);
                        record!(self, buffered, st.queue.high_water_mark());
                        trace!(depth, "item buffered");
                    }
                }
            }
        }
        self.settled();
    }

    /// Upstream `on_completed` / `on_error`.
    pub(crate) fn on_terminal(&self, terminal: Terminal<E>) {
        {
            let mut st = lock(&self.state);
            if self.cancelled.is_cancelled() {
                return;
            }
            if st.finished {
                if st.terminal.is_set() {
                    warn!("second terminal signal received; ignoring it");
                }
                return;
            }
            self.settle_due_tick(&mut st);

            if !st.finished {
                if let Err(rejected) = st.terminal.record(terminal) {
                    warn!(error = rejected.is_error(), "second terminal signal received; ignoring it");
                } else if st.queue.is_empty() {
                    if let Some(terminal) = st.terminal.release() {
                        debug!(error = terminal.is_error(), "terminal delivered");
                        self.sink.forward_terminal(terminal);
                    }
                    self.finish(&mut st);
                } else {
                    record!(self, terminal_deferred);
                    debug!(pending = st.queue.len(), "terminal deferred until queue drains");
                }
            }
        }
        self.settled();
    }

    /// Consumer unsubscribed. Idempotent.
    pub(crate) fn dispose(&self) {
        if !self.cancelled.cancel() {
            return;
        }
        self.sink.discard();
        let discarded = {
            let mut st = lock(&self.state);
            let discarded = st.queue.len();
            self.finish(&mut st);
            discarded
        };
        record!(self, discarded, discarded);
        debug!(discarded, "normalize subscription disposed");
        self.detach();
    }

    /// Hand over the upstream subscription once `subscribe` on the source has
    /// returned. If the instance already ended while subscribing, it is
    /// closed straight away.
    pub(crate) fn attach_upstream(&self, subscription: Subscription) {
        let mut upstream = lock(&self.upstream);
        if matches!(*upstream, Upstream::Detached) {
            drop(upstream);
            subscription.unsubscribe();
        } else {
            *upstream = Upstream::Attached(subscription);
        }
    }

    /// Stop listening to upstream. Idempotent.
    fn detach(&self) {
        let previous = std::mem::replace(&mut *lock(&self.upstream), Upstream::Detached);
        if let Upstream::Attached(subscription) = previous {
            trace!("detached from upstream");
            subscription.unsubscribe();
        }
    }

    /// Deliver what the last transition produced, then let go of upstream
    /// if that transition ended the instance. Runs without the state lock.
    fn settled(&self) {
        self.sink.drain();
        if self.done.is_cancelled() {
            self.detach();
        }
    }

    fn on_tick(&self, generation: u64) {
        {
            let mut st = lock(&self.state);
            if self.cancelled.is_cancelled() || st.finished || st.generation != generation {
                trace!(generation, "stale tick ignored");
                return;
            }
            st.timer = None;
            self.run_tick(&mut st);
        }
        self.settled();
    }

    /// The body of a tick: drain one item or close the window.
    fn run_tick(&self, st: &mut ControllerState<T, E>) {
        record!(self, tick_fired);
        let Some(item) = st.queue.pop_front() else {
            st.window = WindowState::Idle;
            record!(self, window_closed);
            debug!("window closed");
            return;
        };

        self.sink.forward(item);
        record!(self, drained);
        if st.queue.is_empty() && st.terminal.is_pending() {
            if let Some(terminal) = st.terminal.release() {
                debug!(error = terminal.is_error(), "deferred terminal delivered");
                self.sink.forward_terminal(terminal);
            }
            self.finish(st);
            return;
        }
        trace!(remaining = st.queue.len(), "item drained");
        self.open_window(st);
    }

    /// A tick that is due but has not run yet is performed now, ahead of
    /// whatever just arrived.
    fn settle_due_tick(&self, st: &mut ControllerState<T, E>) {
        if !st.window.is_due(self.scheduler.now()) {
            return;
        }
        if let Some(timer) = st.timer.take() {
            timer.cancel();
        }
        st.generation += 1;
        debug!("tick due; running it ahead of the new arrival");
        self.run_tick(st);
    }

    /// Start a window at the scheduler's current time and arm its tick.
    fn open_window(&self, st: &mut ControllerState<T, E>) {
        let now = self.scheduler.now();
        match self.schedule_tick(st) {
            Ok(()) => {
                let reopened = st.window.is_open();
                st.window = WindowState::open_at(now, self.window);
                if !reopened {
                    debug!(window = ?self.window, deadline = ?st.window.deadline(), "window opened");
                }
            }
            Err(e) => self.fail(st, e),
        }
    }

    fn schedule_tick(&self, st: &mut ControllerState<T, E>) -> Result<(), SchedulerError> {
        st.generation += 1;
        let generation = st.generation;
        let this = self.this.clone();
        let handle = self.scheduler.schedule_after(
            self.window,
            Box::new(move || {
                if let Some(controller) = this.upgrade() {
                    controller.on_tick(generation);
                }
            }),
        )?;
        if let Some(previous) = st.timer.replace(handle) {
            previous.cancel();
        }
        Ok(())
    }

    /// The scheduler refused a tick: fail the stream rather than strand the
    /// queue.
    fn fail(&self, st: &mut ControllerState<T, E>, cause: SchedulerError) {
        let stranded = st.queue.len();
        error!(error = %cause, stranded, "scheduler rejected window tick; failing stream");
        record!(self, scheduler_rejected);
        record!(self, discarded, stranded);
        self.sink
            .forward_terminal(Terminal::Failed(E::from(NormalizeError::SchedulerRejected(cause))));
        self.finish(st);
    }

    fn finish(&self, st: &mut ControllerState<T, E>) {
        st.finished = true;
        self.done.cancel();
        if let Some(timer) = st.timer.take() {
            timer.cancel();
        }
        st.queue.clear();
        st.window = WindowState::Idle;
        st.generation += 1;
    }
}

/// Forwards upstream calls into a controller. This is the observer the
/// operator subscribes to its source.
pub(crate) struct ControllerObserver<T, E, O> {
    pub(crate) controller: Arc<WindowController<T, E, O>>,
}

impl<T, E, O> Observer<T, E> for ControllerObserver<T, E, O>
where
    T: Send + 'static,
    E: From<NormalizeError> + Send + 'static,
    O: Observer<T, E> + 'static,
{
    fn on_next(&mut self, item: T) {
        self.controller.on_next(item);
    }

    fn on_error(&mut self, error: E) {
        self.controller.on_terminal(Terminal::Failed(error));
    }

    fn on_completed(&mut self) {
        self.controller.on_terminal(Terminal::Completed);
    }
}
