//! Cancellation handles.
//!
//! - [`CancellationToken`] is a shared one-way flag. Timer callbacks check it
//!   before they act, which makes "tick fires after unsubscribe" a no-op.
//! - [`Subscription`] is what a consumer holds: an idempotent `unsubscribe`
//!   that runs every registered teardown exactly once.

use crate::utils::lock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` if this call was the one that set it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle returned by [`Source::subscribe`](crate::source::Source::subscribe).
///
/// Cloning yields another handle to the same subscription.
#[derive(Clone, Default)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

#[derive(Default)]
struct SubscriptionInner {
    closed: CancellationToken,
    teardowns: Mutex<Vec<Teardown>>,
}

impl Subscription {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscription whose only teardown is `f`.
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        let s = Self::new();
        s.add(f);
        s
    }

    /// A subscription that is already closed.
    #[must_use]
    pub fn closed() -> Self {
        let s = Self::new();
        s.unsubscribe();
        s
    }

    /// Register a teardown. If the subscription is already closed it runs now.
    pub fn add(&self, teardown: impl FnOnce() + Send + 'static) {
        {
            let mut teardowns = lock(&self.inner.teardowns);
            if !self.inner.closed.is_cancelled() {
                teardowns.push(Box::new(teardown));
                return;
            }
        }
        teardown();
    }

    /// Tie `other` to this subscription: closing this one closes `other`.
    pub fn add_subscription(&self, other: Subscription) {
        self.add(move || other.unsubscribe());
    }

    /// Close the subscription. Only the first call runs teardowns, in
    /// registration order.
    pub fn unsubscribe(&self) {
        if !self.inner.closed.cancel() {
            return;
        }
        let teardowns = std::mem::take(&mut *lock(&self.inner.teardowns));
        for teardown in teardowns {
            teardown();
        }
    }

    #[inline]
    pub fn is_unsubscribed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}
