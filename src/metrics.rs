//! Counters describing what a normalize operator has been doing.
//!
//! Attach a [`NormalizeMetrics`] recorder to a [`Normalize`](crate::Normalize)
//! operator and every subscription it creates reports into it. Read the
//! numbers back with [`NormalizeMetrics::snapshot`], print them, or save them
//! as JSON.
//!
//! # Example
//!
//! ```
//! use stream_normalize::*;
//! use stream_normalize::metrics::NormalizeMetrics;
//! use stream_normalize::scheduler::TestScheduler;
//! use stream_normalize::testing::RecordingObserver;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let scheduler = TestScheduler::new();
//! let metrics = NormalizeMetrics::new();
//! let op = Normalize::new(Duration::from_secs(1), scheduler.shared())?
//!     .with_metrics(metrics.clone());
//!
//! let subject = PublishSubject::<u32, NormalizeError>::new();
//! let _sub = op.apply(subject.clone()).subscribe_with(RecordingObserver::new());
//! subject.on_next(1);
//! subject.on_next(2);
//!
//! let snap = metrics.snapshot();
//! assert_eq!(snap.items_forwarded_immediately, 1);
//! assert_eq!(snap.items_buffered, 1);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe recorder shared by every subscription of one operator.
///
/// Cloning yields another handle to the same counters.
#[derive(Clone, Debug, Default)]
pub struct NormalizeMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    items_received: AtomicU64,
    items_forwarded_immediately: AtomicU64,
    items_buffered: AtomicU64,
    items_drained: AtomicU64,
    items_discarded: AtomicU64,
    ticks_fired: AtomicU64,
    windows_closed: AtomicU64,
    terminals_deferred: AtomicU64,
    scheduler_rejections: AtomicU64,
    max_queue_depth: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Items accepted from upstream.
    pub items_received: u64,
    /// Items that went straight through on an idle window.
    pub items_forwarded_immediately: u64,
    /// Items queued behind an open window.
    pub items_buffered: u64,
    /// Queued items released by a tick.
    pub items_drained: u64,
    /// Queued items thrown away by unsubscribe or a scheduler failure.
    pub items_discarded: u64,
    /// Ticks that ran (stale or cancelled ticks excluded).
    pub ticks_fired: u64,
    /// Ticks that found the queue empty and closed the window.
    pub windows_closed: u64,
    /// Terminal signals held back behind queued items.
    pub terminals_deferred: u64,
    /// Tick registrations refused by the scheduler.
    pub scheduler_rejections: u64,
    /// Deepest any pending queue has been.
    pub max_queue_depth: u64,
}

impl NormalizeMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn item_received(&self) {
        self.inner.items_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn forwarded_immediately(&self) {
        self.inner.items_forwarded_immediately.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn buffered(&self, depth: usize) {
        self.inner.items_buffered.fetch_add(1, Ordering::Relaxed);
        self.inner.max_queue_depth.fetch_max(depth as u64, Ordering::Relaxed);
    }

    pub(crate) fn drained(&self) {
        self.inner.items_drained.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discarded(&self, count: usize) {
        self.inner.items_discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn tick_fired(&self) {
        self.inner.ticks_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn window_closed(&self) {
        self.inner.windows_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn terminal_deferred(&self) {
        self.inner.terminals_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scheduler_rejected(&self) {
        self.inner.scheduler_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy out the current values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        MetricsSnapshot {
            items_received: c.items_received.load(Ordering::Relaxed),
            items_forwarded_immediately: c.items_forwarded_immediately.load(Ordering::Relaxed),
            items_buffered: c.items_buffered.load(Ordering::Relaxed),
            items_drained: c.items_drained.load(Ordering::Relaxed),
            items_discarded: c.items_discarded.load(Ordering::Relaxed),
            ticks_fired: c.ticks_fired.load(Ordering::Relaxed),
            windows_closed: c.windows_closed.load(Ordering::Relaxed),
            terminals_deferred: c.terminals_deferred.load(Ordering::Relaxed),
            scheduler_rejections: c.scheduler_rejections.load(Ordering::Relaxed),
            max_queue_depth: c.max_queue_depth.load(Ordering::Relaxed),
        }
    }

    /// The snapshot as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    /// Print the counters to stdout, one per line, sorted by name.
    pub fn print(&self) {
        println!("\n========== Normalize Metrics ==========");
        if let Value::Object(map) = self.to_json() {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, value) in entries {
                println!("{name}: {value}");
            }
        }
        println!("=======================================\n");
    }

    /// Save the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.snapshot())?;
        let mut file = File::create(path)
            .with_context(|| format!("creating metrics file {}", path.display()))?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}
