use std::time::Duration;

/// Whether a window is currently open, and until when.
///
/// `deadline` is the scheduler time at which the outstanding tick is due:
/// the last emission time plus the window length.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum WindowState {
    /// No tick scheduled. The next item goes straight through.
    #[default]
    Idle,
    /// A tick is scheduled for `deadline`.
    Open { deadline: Duration },
}

impl WindowState {
    /// Open a window of length `window` starting at `now`.
    #[inline]
    pub fn open_at(now: Duration, window: Duration) -> Self {
        debug_assert!(!window.is_zero());
        WindowState::Open { deadline: now.saturating_add(window) }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, WindowState::Open { .. })
    }

    /// The tick for this window should already have run at `now`.
    #[inline]
    pub fn is_due(&self, now: Duration) -> bool {
        match *self {
            WindowState::Open { deadline } => now >= deadline,
            WindowState::Idle => false,
        }
    }

    #[inline]
    pub fn deadline(&self) -> Option<Duration> {
        match *self {
            WindowState::Open { deadline } => Some(deadline),
            WindowState::Idle => None,
        }
    }
}
