//! Small synchronization helpers shared across the crate.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Every piece of state guarded here is left consistent between statements,
/// so a panic inside a downstream observer must not wedge the operator for
/// every other thread.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
