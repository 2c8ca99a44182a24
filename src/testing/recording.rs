//! An observer that records what it sees, for assertions in tests.

use crate::observer::{Notification, Observer, Terminal};
use crate::scheduler::Scheduler;
use crate::utils::lock;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded call, stamped with the clock time if the recorder has a clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded<T, E> {
    pub at: Option<Duration>,
    pub notification: Notification<T, E>,
}

/// Records every call it receives. Clones share the same record, so keep one
/// clone for assertions and hand another to `subscribe`.
///
/// The `take_*` methods consume events from the front, mirroring how a test
/// reads a stream: take what you expect, then assert nothing else arrived.
///
/// # Example
///
/// ```
/// use stream_normalize::observer::Observer;
/// use stream_normalize::testing::RecordingObserver;
///
/// let out = RecordingObserver::<u32, String>::new();
/// let mut sink = out.clone();
/// sink.on_next(7);
/// sink.on_completed();
///
/// assert_eq!(out.take_next(), 7);
/// out.assert_completed();
/// out.assert_no_more_events();
/// ```
pub struct RecordingObserver<T, E> {
    events: Arc<Mutex<VecDeque<Recorded<T, E>>>>,
    clock: Option<Arc<dyn Scheduler>>,
}

impl<T, E> Clone for RecordingObserver<T, E> {
    fn clone(&self) -> Self {
        Self { events: Arc::clone(&self.events), clock: self.clock.clone() }
    }
}

impl<T, E> Default for RecordingObserver<T, E> {
    fn default() -> Self {
        Self { events: Arc::new(Mutex::new(VecDeque::new())), clock: None }
    }
}

impl<T, E> RecordingObserver<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every event with `clock.now()` at the moment it is received.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Scheduler>) -> Self {
        Self { clock: Some(clock), ..Self::default() }
    }

    fn push(&self, notification: Notification<T, E>) {
        let at = self.clock.as_ref().map(|c| c.now());
        lock(&self.events).push_back(Recorded { at, notification });
    }

    /// Events not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the oldest event.
    ///
    /// # Panics
    ///
    /// Panics if nothing has been recorded.
    pub fn take_event(&self) -> Recorded<T, E> {
        match lock(&self.events).pop_front() {
            Some(event) => event,
            None => panic!("expected an event, but none was recorded"),
        }
    }

    /// Copy of every event not yet taken, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<Recorded<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        lock(&self.events).iter().cloned().collect()
    }

    /// Take every remaining event.
    pub fn drain_events(&self) -> Vec<Recorded<T, E>> {
        lock(&self.events).drain(..).collect()
    }
}

impl<T: Debug, E: Debug> RecordingObserver<T, E> {
    /// Take the oldest event, which must be an item.
    ///
    /// # Panics
    ///
    /// Panics if there is no event or it is a terminal.
    pub fn take_next(&self) -> T {
        match self.take_event().notification {
            Notification::Next(item) => item,
            other => panic!("expected an item, got {other:?}"),
        }
    }

    /// Take the oldest event, which must be an error.
    ///
    /// # Panics
    ///
    /// Panics if there is no event or it is not an error.
    pub fn take_error(&self) -> E {
        match self.take_event().notification {
            Notification::Terminal(Terminal::Failed(error)) => error,
            other => panic!("expected an error, got {other:?}"),
        }
    }

    /// Take the oldest event, which must be completion.
    ///
    /// # Panics
    ///
    /// Panics if there is no event or it is not completion.
    pub fn assert_completed(&self) {
        match self.take_event().notification {
            Notification::Terminal(Terminal::Completed) => {}
            other => panic!("expected completion, got {other:?}"),
        }
    }

    /// # Panics
    ///
    /// Panics if any event is still unread.
    pub fn assert_no_more_events(&self) {
        let events = lock(&self.events);
        assert!(events.is_empty(), "expected no more events, found {:?}", *events);
    }
}

impl<T: Send, E: Send> Observer<T, E> for RecordingObserver<T, E> {
    fn on_next(&mut self, item: T) {
        self.push(Notification::Next(item));
    }

    fn on_error(&mut self, error: E) {
        self.push(Notification::Terminal(Terminal::Failed(error)));
    }

    fn on_completed(&mut self) {
        self.push(Notification::Terminal(Terminal::Completed));
    }
}
