//! Upstream sources.
//!
//! A [`Source`] accepts an observer and returns the [`Subscription`] that
//! detaches it. Two sources ship with the crate:
//!
//! - [`PublishSubject`]: a hot, multicasting source you push into by hand.
//! - [`iter_source`]: a cold source replaying an iterator, then completing.

use crate::observer::{Observer, Terminal};
use crate::subscription::Subscription;
use crate::utils::lock;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

/// Something an [`Observer`] can subscribe to.
pub trait Source {
    type Item;
    type Error;

    /// Attach `observer`. The returned subscription detaches it.
    fn subscribe(&self, observer: Box<dyn Observer<Self::Item, Self::Error>>) -> Subscription;

    /// Convenience wrapper boxing a concrete observer.
    fn subscribe_with<O>(&self, observer: O) -> Subscription
    where
        Self: Sized,
        O: Observer<Self::Item, Self::Error> + 'static,
    {
        self.subscribe(Box::new(observer))
    }
}

type SharedObserver<T, E> = Arc<Mutex<Box<dyn Observer<T, E>>>>;

/// Hot source that forwards whatever is pushed into it to every current
/// observer. Late subscribers to a terminated subject get the terminal only.
pub struct PublishSubject<T, E> {
    state: Arc<Mutex<SubjectState<T, E>>>,
}

struct SubjectState<T, E> {
    observers: Vec<(u64, SharedObserver<T, E>)>,
    next_id: u64,
    terminal: Option<Terminal<E>>,
}

impl<T, E> Clone for PublishSubject<T, E> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<T, E> Default for PublishSubject<T, E> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                observers: Vec::new(),
                next_id: 0,
                terminal: None,
            })),
        }
    }
}

impl<T, E> PublishSubject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an item to every current observer. Ignored after a terminal.
    pub fn on_next(&self, item: T) {
        let observers = {
            let st = lock(&self.state);
            if st.terminal.is_some() {
                return;
            }
            st.observers.iter().map(|(_, o)| Arc::clone(o)).collect::<Vec<_>>()
        };
        // Observers are called outside the subject lock so they may push
        // back into this subject.
        for observer in observers {
            lock(&observer).on_next(item.clone());
        }
    }

    pub fn on_error(&self, error: E) {
        self.terminate(Terminal::Failed(error));
    }

    pub fn on_completed(&self) {
        self.terminate(Terminal::Completed);
    }

    fn terminate(&self, terminal: Terminal<E>) {
        let observers = {
            let mut st = lock(&self.state);
            if st.terminal.is_some() {
                return;
            }
            st.terminal = Some(terminal.clone());
            std::mem::take(&mut st.observers)
        };
        for (_, observer) in observers {
            terminal.clone().deliver(&mut **lock(&observer));
        }
    }

    /// Number of currently attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.state).observers.len()
    }

    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }
}

impl<T, E> Source for PublishSubject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, mut observer: Box<dyn Observer<T, E>>) -> Subscription {
        let id = {
            let mut st = lock(&self.state);
            if let Some(terminal) = st.terminal.clone() {
                drop(st);
                terminal.deliver(&mut *observer);
                return Subscription::closed();
            }
            let id = st.next_id;
            st.next_id += 1;
            st.observers.push((id, Arc::new(Mutex::new(observer))));
            id
        };

        let weak = Arc::downgrade(&self.state);
        Subscription::from_fn(move || {
            if let Some(state) = weak.upgrade() {
                lock(&state).observers.retain(|(i, _)| *i != id);
            }
        })
    }
}

impl<T, E> Observer<T, E> for PublishSubject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_next(&mut self, item: T) {
        PublishSubject::on_next(self, item);
    }

    fn on_error(&mut self, error: E) {
        PublishSubject::on_error(self, error);
    }

    fn on_completed(&mut self) {
        PublishSubject::on_completed(self);
    }
}

/// Cold source created by [`iter_source`].
pub struct IterSource<I, E> {
    items: I,
    _error: PhantomData<fn() -> E>,
}

/// Replay `items` synchronously to each subscriber, then complete.
///
/// The error type is only nominal; an iterator source never fails.
pub fn iter_source<I, E>(items: I) -> IterSource<I, E>
where
    I: IntoIterator + Clone,
{
    IterSource { items, _error: PhantomData }
}

impl<I, E> Source for IterSource<I, E>
where
    I: IntoIterator + Clone,
{
    type Item = I::Item;
    type Error = E;

    fn subscribe(&self, mut observer: Box<dyn Observer<I::Item, E>>) -> Subscription {
        // Replay finishes before the caller holds the subscription, so there
        // is nothing left for it to cancel.
        for item in self.items.clone() {
            observer.on_next(item);
        }
        observer.on_completed();
        Subscription::new()
    }
}
