//! The push side of a stream: observers and the notifications they receive.
//!
//! An [`Observer`] sees `on_next*` followed by at most one terminal call
//! (`on_error` or `on_completed`). Nothing in this crate ever calls an observer
//! concurrently with itself.

/// Single-consumer push sink.
pub trait Observer<T, E>: Send {
    /// Receive the next item.
    fn on_next(&mut self, item: T);

    /// Receive a failure. No further calls follow.
    fn on_error(&mut self, error: E);

    /// Receive normal completion. No further calls follow.
    fn on_completed(&mut self);
}

impl<T, E, O> Observer<T, E> for Box<O>
where
    O: Observer<T, E> + ?Sized,
{
    #[inline]
    fn on_next(&mut self, item: T) {
        (**self).on_next(item);
    }

    #[inline]
    fn on_error(&mut self, error: E) {
        (**self).on_error(error);
    }

    #[inline]
    fn on_completed(&mut self) {
        (**self).on_completed();
    }
}

/// A terminal signal: the stream either completed or failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminal<E> {
    Completed,
    Failed(E),
}

impl<E> Terminal<E> {
    /// Hand this signal to `observer`.
    pub fn deliver<T, O>(self, observer: &mut O)
    where
        O: Observer<T, E> + ?Sized,
    {
        match self {
            Terminal::Completed => observer.on_completed(),
            Terminal::Failed(error) => observer.on_error(error),
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Terminal::Failed(_))
    }
}

/// Any single call an observer can receive, reified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<T, E> {
    Next(T),
    Terminal(Terminal<E>),
}

impl<T, E> Notification<T, E> {
    /// Hand this notification to `observer`.
    pub fn deliver<O>(self, observer: &mut O)
    where
        O: Observer<T, E> + ?Sized,
    {
        match self {
            Notification::Next(item) => observer.on_next(item),
            Notification::Terminal(terminal) => terminal.deliver(observer),
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Notification::Terminal(_))
    }
}
