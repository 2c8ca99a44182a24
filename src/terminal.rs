//! Holds a terminal signal until the pending queue has drained.

use crate::observer::Terminal;

#[derive(Debug)]
enum Record<E> {
    None,
    Pending(Terminal<E>),
    Released,
}

/// At most one terminal signal, recorded once and released once.
///
/// Once recorded the coordinator never reports "unset" again, even after the
/// signal has been handed downstream.
#[derive(Debug)]
pub struct TerminalCoordinator<E> {
    record: Record<E>,
}

impl<E> Default for TerminalCoordinator<E> {
    fn default() -> Self {
        Self { record: Record::None }
    }
}

impl<E> TerminalCoordinator<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `terminal`. A second terminal is handed back untouched.
    ///
    /// # Errors
    ///
    /// Returns the rejected signal if one was already recorded.
    pub fn record(&mut self, terminal: Terminal<E>) -> Result<(), Terminal<E>> {
        match self.record {
            Record::None => {
                self.record = Record::Pending(terminal);
                Ok(())
            }
            Record::Pending(_) | Record::Released => Err(terminal),
        }
    }

    /// Take the recorded signal for delivery. Yields it at most once.
    pub fn release(&mut self) -> Option<Terminal<E>> {
        match std::mem::replace(&mut self.record, Record::Released) {
            Record::Pending(terminal) => Some(terminal),
            Record::None => {
                self.record = Record::None;
                None
            }
            Record::Released => None,
        }
    }

    /// A terminal has been recorded (whether or not it was released).
    #[inline]
    pub fn is_set(&self) -> bool {
        !matches!(self.record, Record::None)
    }

    /// A terminal is recorded and still waiting for delivery.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.record, Record::Pending(_))
    }
}
