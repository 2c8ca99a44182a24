//! Assertion functions for recorded streams.
//!
//! These work on the output of a [`RecordingObserver`](super::RecordingObserver)
//! and panic with a message that shows the whole recording on failure.

use super::recording::Recorded;
use crate::observer::{Notification, Terminal};
use std::fmt::Debug;
use std::time::Duration;

/// Assert that two item sequences are equal in order and content.
///
/// # Panics
///
/// Panics if the sequences differ in length or content.
///
/// # Example
///
/// ```
/// use stream_normalize::testing::assert_items_in_order;
///
/// assert_items_in_order(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_items_in_order<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Item count mismatch:\n  Expected count: {}\n  Actual count: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Item mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that consecutive timestamps are at least `window` apart.
///
/// # Panics
///
/// Panics at the first pair closer than `window`.
///
/// # Example
///
/// ```
/// use stream_normalize::testing::assert_min_spacing;
/// use std::time::Duration;
///
/// let s = Duration::from_secs;
/// assert_min_spacing(&[s(0), s(1), s(5)], s(1));
/// ```
pub fn assert_min_spacing(timestamps: &[Duration], window: Duration) {
    for (i, pair) in timestamps.windows(2).enumerate() {
        let gap = pair[1].saturating_sub(pair[0]);
        assert!(
            gap >= window,
            "Items {i} and {} are {gap:?} apart, less than the window {window:?}\n  Timestamps: {timestamps:?}",
            i + 1
        );
    }
}

/// Split a recording into its items, their timestamps, and the terminal.
///
/// # Panics
///
/// Panics if anything follows a terminal, or more than one terminal was
/// recorded.
#[allow(clippy::type_complexity)]
pub fn split_recording<T: Debug, E: Debug>(
    events: Vec<Recorded<T, E>>,
) -> (Vec<T>, Vec<Option<Duration>>, Option<Terminal<E>>) {
    let mut items = Vec::new();
    let mut times = Vec::new();
    let mut terminal = None;
    for (i, event) in events.into_iter().enumerate() {
        assert!(
            terminal.is_none(),
            "Event {i} ({:?}) arrived after terminal {terminal:?}",
            event.notification
        );
        match event.notification {
            Notification::Next(item) => {
                items.push(item);
                times.push(event.at);
            }
            Notification::Terminal(t) => terminal = Some(t),
        }
    }
    (items, times, terminal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Item mismatch at index 1")]
    fn order_mismatch_panics() {
        assert_items_in_order(&[1, 3, 2], &[1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "less than the window")]
    fn tight_spacing_panics() {
        let ms = Duration::from_millis;
        assert_min_spacing(&[ms(0), ms(1000), ms(1500)], ms(1000));
    }

    #[test]
    fn split_separates_items_and_terminal() {
        let events: Vec<Recorded<u8, ()>> = vec![
            Recorded { at: Some(Duration::ZERO), notification: Notification::Next(1) },
            Recorded { at: None, notification: Notification::Next(2) },
            Recorded { at: None, notification: Notification::Terminal(Terminal::Completed) },
        ];
        let (items, times, terminal) = split_recording(events);
        assert_eq!(items, vec![1, 2]);
        assert_eq!(times, vec![Some(Duration::ZERO), None]);
        assert_eq!(terminal, Some(Terminal::Completed));
    }

    #[test]
    #[should_panic(expected = "arrived after terminal")]
    fn item_after_terminal_panics() {
        let events: Vec<Recorded<u8, ()>> = vec![
            Recorded { at: None, notification: Notification::Terminal(Terminal::Completed) },
            Recorded { at: None, notification: Notification::Next(1) },
        ];
        split_recording(events);
    }
}
