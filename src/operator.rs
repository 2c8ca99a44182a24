//! The `normalize` operator and its entry points.

use crate::config::NormalizeConfig;
use crate::controller::{ControllerObserver, MetricsHandle, WindowController};
use crate::error::NormalizeError;
#[cfg(feature = "metrics")]
use crate::metrics::NormalizeMetrics;
use crate::observer::Observer;
use crate::scheduler::{self, Scheduler, ThreadScheduler};
use crate::source::Source;
use crate::subscription::Subscription;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A configured normalize operator: a window length plus the scheduler that
/// times it.
///
/// The operator is cheap to clone and can be applied to any number of
/// sources; each subscription gets its own independent state.
///
/// # Example
///
/// ```
/// use stream_normalize::*;
/// use stream_normalize::scheduler::TestScheduler;
/// use stream_normalize::testing::RecordingObserver;
/// use std::time::Duration;
///
/// # fn main() -> anyhow::Result<()> {
/// let scheduler = TestScheduler::new();
/// let subject = PublishSubject::<u32, NormalizeError>::new();
/// let out = RecordingObserver::new();
///
/// let _sub = Normalize::new(Duration::from_secs(1), scheduler.shared())?
///     .apply(subject.clone())
///     .subscribe_with(out.clone());
///
/// subject.on_next(0);
/// subject.on_next(1);
/// assert_eq!(out.take_next(), 0);
/// out.assert_no_more_events();
///
/// scheduler.advance_time_by(Duration::from_secs(1));
/// assert_eq!(out.take_next(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Normalize {
    window: Duration,
    scheduler: Arc<dyn Scheduler>,
    metrics: MetricsHandle,
}

impl Normalize {
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvalidWindow`] if `window` is zero.
    pub fn new(window: Duration, scheduler: Arc<dyn Scheduler>) -> Result<Self, NormalizeError> {
        if window.is_zero() {
            return Err(NormalizeError::InvalidWindow(window));
        }
        Ok(Self { window, scheduler, metrics: MetricsHandle::default() })
    }

    /// Use the shared [`computation`](scheduler::computation) scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvalidWindow`] if `window` is zero, or
    /// [`NormalizeError::SchedulerStart`] if the shared scheduler could not
    /// start.
    pub fn with_default_scheduler(window: Duration) -> Result<Self, NormalizeError> {
        if window.is_zero() {
            return Err(NormalizeError::InvalidWindow(window));
        }
        Self::new(window, scheduler::computation()?)
    }

    /// Build an operator from a [`NormalizeConfig`]. A configured worker count
    /// gets a dedicated [`ThreadScheduler`]; otherwise the shared one is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the scheduler
    /// cannot start.
    pub fn from_config(config: &NormalizeConfig) -> Result<Self, NormalizeError> {
        config.validate()?;
        let scheduler: Arc<dyn Scheduler> = match config.scheduler_threads {
            Some(workers) => Arc::new(ThreadScheduler::new(workers)?),
            None => scheduler::computation()?,
        };
        let op = Self::new(config.window(), scheduler)?;
        #[cfg(feature = "metrics")]
        let op = if config.metrics { op.with_metrics(NormalizeMetrics::new()) } else { op };
        #[cfg(not(feature = "metrics"))]
        if config.metrics {
            tracing::warn!("metrics requested but the `metrics` feature is disabled");
        }
        Ok(op)
    }

    /// Report every subscription's activity into `metrics`.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, metrics: NormalizeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[cfg(feature = "metrics")]
    #[inline]
    pub fn metrics(&self) -> Option<&NormalizeMetrics> {
        self.metrics.as_ref()
    }

    #[inline]
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Wrap `source`. Nothing happens until the result is subscribed.
    pub fn apply<S: Source>(&self, source: S) -> Normalized<S> {
        Normalized { source, op: self.clone() }
    }
}

impl fmt::Debug for Normalize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Normalize");
        s.field("window", &self.window);
        #[cfg(feature = "metrics")]
        s.field("metrics", &self.metrics.is_some());
        s.finish_non_exhaustive()
    }
}

/// A source whose items are spaced at least one window apart.
pub struct Normalized<S> {
    source: S,
    op: Normalize,
}

impl<S> Normalized<S> {
    pub fn operator(&self) -> &Normalize {
        &self.op
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S> Source for Normalized<S>
where
    S: Source,
    S::Item: Send + 'static,
    S::Error: From<NormalizeError> + Send + 'static,
{
    type Item = S::Item;
    type Error = S::Error;

    fn subscribe(&self, observer: Box<dyn Observer<S::Item, S::Error>>) -> Subscription {
        let controller = WindowController::new(
            self.op.window,
            Arc::clone(&self.op.scheduler),
            observer,
            self.op.metrics.clone(),
        );
        debug!(window = ?self.op.window, "normalize subscribed");

        let subscription = Subscription::new();
        let disposer = Arc::clone(&controller);
        subscription.add(move || disposer.dispose());

        let upstream = self
            .source
            .subscribe(Box::new(ControllerObserver { controller: Arc::clone(&controller) }));
        subscription.add_subscription(upstream.clone());
        controller.attach_upstream(upstream);
        subscription
    }
}

/// `normalize` as a method on every [`Source`].
pub trait NormalizeExt: Source + Sized {
    /// Normalize on the shared computation scheduler.
    ///
    /// # Errors
    ///
    /// See [`Normalize::with_default_scheduler`].
    fn normalize(self, window: Duration) -> Result<Normalized<Self>, NormalizeError> {
        Ok(Normalize::with_default_scheduler(window)?.apply(self))
    }

    /// Normalize on an explicit scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvalidWindow`] if `window` is zero.
    fn normalize_on(
        self,
        window: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Normalized<Self>, NormalizeError> {
        Ok(Normalize::new(window, scheduler)?.apply(self))
    }

    /// Normalize with a pre-built operator.
    fn normalize_with(self, op: &Normalize) -> Normalized<Self> {
        op.apply(self)
    }
}

impl<S: Source> NormalizeExt for S {}
