//! Serialized delivery to the downstream observer.
//!
//! The controller offers notifications while it holds its own lock, so the
//! outbox order is the decision order. Delivery happens afterwards through an
//! emitter loop: whichever thread finds no emitter active becomes the emitter
//! and drains the outbox; everyone else just leaves their notifications
//! behind. The downstream observer therefore sees one call at a time, in one
//! total order, and may call back into the operator without deadlocking.

use crate::observer::{Notification, Observer, Terminal};
use crate::subscription::CancellationToken;
use crate::utils::lock;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

pub(crate) struct SerializedSink<T, E, O> {
    downstream: Mutex<O>,
    outbox: Mutex<Outbox<T, E>>,
    cancelled: CancellationToken,
    _observer: PhantomData<fn(T, E)>,
}

struct Outbox<T, E> {
    queue: VecDeque<Notification<T, E>>,
    emitter: Option<ThreadId>,
    terminated: bool,
}

impl<T, E, O> SerializedSink<T, E, O>
where
    O: Observer<T, E>,
{
    pub(crate) fn new(downstream: O, cancelled: CancellationToken) -> Self {
        Self {
            downstream: Mutex::new(downstream),
            outbox: Mutex::new(Outbox { queue: VecDeque::new(), emitter: None, terminated: false }),
            cancelled,
            _observer: PhantomData,
        }
    }

    pub(crate) fn forward(&self, item: T) {
        self.offer(Notification::Next(item));
    }

    pub(crate) fn forward_terminal(&self, terminal: Terminal<E>) {
        self.offer(Notification::Terminal(terminal));
    }

    fn offer(&self, notification: Notification<T, E>) {
        let mut out = lock(&self.outbox);
        if out.terminated {
            return;
        }
        out.terminated = notification.is_terminal();
        out.queue.push_back(notification);
    }

    /// Deliver everything offered so far, unless another thread is already
    /// doing so.
    ///
    /// If the downstream observer panics, the panic propagates to the caller
    /// but the emitter slot is released, so the next `drain` picks up where
    /// this one stopped.
    pub(crate) fn drain(&self) {
        {
            let mut out = lock(&self.outbox);
            if out.emitter.is_some() {
                return;
            }
            out.emitter = Some(thread::current().id());
        }
        let mut emitter = EmitterGuard { outbox: &self.outbox, armed: true };
        loop {
            let next = {
                let mut out = lock(&self.outbox);
                match out.queue.pop_front() {
                    Some(n) => n,
                    None => {
                        // Released under the same lock that saw the queue
                        // empty, so no offer can slip in unnoticed.
                        out.emitter = None;
                        emitter.armed = false;
                        return;
                    }
                }
            };
            let mut downstream = lock(&self.downstream);
            if self.cancelled.is_cancelled() {
                continue;
            }
            next.deliver(&mut *downstream);
        }
    }

    /// Drop undelivered notifications and refuse new ones.
    ///
    /// Unless called from inside a downstream callback, this waits for a
    /// delivery in flight on another thread, so nothing reaches downstream
    /// once it returns.
    pub(crate) fn discard(&self) {
        let reentrant = {
            let mut out = lock(&self.outbox);
            out.queue.clear();
            out.terminated = true;
            out.emitter == Some(thread::current().id())
        };
        if !reentrant {
            drop(lock(&self.downstream));
        }
    }
}

/// Clears the emitter slot if the emitter loop unwinds.
struct EmitterGuard<'a, T, E> {
    outbox: &'a Mutex<Outbox<T, E>>,
    armed: bool,
}

impl<T, E> Drop for EmitterGuard<'_, T, E> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.outbox).emitter = None;
        }
    }
}
