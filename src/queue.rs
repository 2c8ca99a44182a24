//! Unbounded FIFO of items waiting for a window tick.

use std::collections::VecDeque;

/// Items accepted from upstream but not yet delivered, oldest first.
///
/// Also tracks the deepest the queue has ever been, which is the one number
/// worth watching for an unbounded buffer.
#[derive(Debug)]
pub struct PendingQueue<T> {
    items: VecDeque<T>,
    high_water: usize,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self { items: VecDeque::new(), high_water: 0 }
    }
}

impl<T> PendingQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail. Returns the new depth.
    pub fn push_back(&mut self, item: T) -> usize {
        self.items.push_back(item);
        self.high_water = self.high_water.max(self.items.len());
        self.items.len()
    }

    /// Remove the oldest item.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop everything still queued. Returns how many items were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }

    #[inline]
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = PendingQueue::new();
        for i in 1..=3 {
            q.push_back(i);
        }
        let drained: Vec<_> = std::iter::from_fn(|| q.pop_front()).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn high_water_mark_survives_draining() {
        let mut q = PendingQueue::new();
        assert_eq!(q.push_back('a'), 1);
        assert_eq!(q.push_back('b'), 2);
        q.pop_front();
        assert_eq!(q.push_back('c'), 2);
        q.pop_front();
        q.pop_front();
        assert_eq!(q.len(), 0);
        assert_eq!(q.high_water_mark(), 2);
    }

    #[test]
    fn clear_reports_discarded() {
        let mut q = PendingQueue::new();
        q.push_back(1);
        q.push_back(2);
        assert_eq!(q.clear(), 2);
        assert_eq!(q.clear(), 0);
        assert_eq!(q.pop_front(), None);
    }
}
