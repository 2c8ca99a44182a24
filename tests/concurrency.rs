//! Wall-clock behavior on the thread scheduler, with racing producers.

use anyhow::Result;
use stream_normalize::testing::*;
use stream_normalize::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_millis(40);

/// Timestamps are taken when the downstream call runs, slightly after the
/// scheduling decision, so wall-clock spacing is checked with some slack.
const SLACK: Duration = Duration::from_millis(10);

/// Wait until `out` has recorded a terminal, or give up after `limit`.
fn wait_for_terminal<T, E>(out: &RecordingObserver<T, E>, limit: Duration) -> bool
where
    T: Clone,
    E: Clone,
{
    let started = Instant::now();
    while started.elapsed() < limit {
        if out.events().iter().any(|e| e.notification.is_terminal()) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[mark_flaky_tests::flaky]
#[test]
fn thread_scheduler_spaces_items_in_real_time() {
    let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::new(2).unwrap());
    let subject = PublishSubject::<u32, NormalizeError>::new();
    let out = RecordingObserver::with_clock(Arc::clone(&scheduler));
    let _sub = subject
        .clone()
        .normalize_on(WINDOW, Arc::clone(&scheduler))
        .unwrap()
        .subscribe_with(out.clone());

    for i in 0..5 {
        subject.on_next(i);
    }
    subject.on_completed();
    assert!(wait_for_terminal(&out, Duration::from_secs(5)));

    let (items, times, terminal) = split_recording(out.drain_events());
    assert_items_in_order(&items, &[0, 1, 2, 3, 4]);
    assert_min_spacing(&times.into_iter().flatten().collect::<Vec<_>>(), WINDOW - SLACK);
    assert_eq!(terminal, Some(Terminal::Completed));
}

#[mark_flaky_tests::flaky]
#[test]
fn racing_producers_lose_nothing_and_keep_per_producer_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 5;
    let window = Duration::from_millis(15);

    let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::new(4).unwrap());
    let subject = PublishSubject::<(usize, usize), NormalizeError>::new();
    let out = RecordingObserver::with_clock(Arc::clone(&scheduler));
    let _sub = subject
        .clone()
        .normalize_on(window, Arc::clone(&scheduler))
        .unwrap()
        .subscribe_with(out.clone());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let subject = subject.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    subject.on_next((p, i));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    subject.on_completed();
    assert!(wait_for_terminal(&out, Duration::from_secs(10)));

    let (items, times, terminal) = split_recording(out.drain_events());
    assert_eq!(items.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(terminal, Some(Terminal::Completed));
    for p in 0..PRODUCERS {
        let seen: Vec<usize> = items.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
        assert_items_in_order(&seen, &(0..PER_PRODUCER).collect::<Vec<_>>());
    }
    assert_min_spacing(&times.into_iter().flatten().collect::<Vec<_>>(), window - SLACK);
}

/// Downstream that checks it is never entered concurrently.
struct Exclusive {
    inside: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
    seen: mpsc::Sender<Option<u32>>,
}

impl Exclusive {
    fn enter(&self) {
        if self.inside.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_millis(1));
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Observer<u32, NormalizeError> for Exclusive {
    fn on_next(&mut self, item: u32) {
        self.enter();
        let _ = self.seen.send(Some(item));
    }

    fn on_error(&mut self, _error: NormalizeError) {
        self.enter();
        let _ = self.seen.send(None);
    }

    fn on_completed(&mut self) {
        self.enter();
        let _ = self.seen.send(None);
    }
}

#[test]
fn downstream_calls_never_overlap() -> Result<()> {
    let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::new(4)?);
    let subject = PublishSubject::<u32, NormalizeError>::new();
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();
    let _sub = subject
        .clone()
        .normalize_on(Duration::from_millis(2), Arc::clone(&scheduler))?
        .subscribe_with(Exclusive {
            inside: Arc::new(AtomicUsize::new(0)),
            overlaps: Arc::clone(&overlaps),
            seen: tx,
        });

    let handles: Vec<_> = (0..3)
        .map(|p| {
            let subject = subject.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    subject.on_next(p * 100 + i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().map_err(|_| anyhow::anyhow!("producer panicked"))?;
    }
    subject.on_completed();

    let mut items = 0;
    loop {
        match rx.recv_timeout(Duration::from_secs(10))? {
            Some(_) => items += 1,
            None => break,
        }
    }
    assert_eq!(items, 30);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    Ok(())
}

/// Downstream that unsubscribes its own subscription from inside `on_next`.
struct SelfCancelling {
    subscription: Arc<Mutex<Option<Subscription>>>,
    seen: Arc<Mutex<Vec<u32>>>,
}

impl Observer<u32, NormalizeError> for SelfCancelling {
    fn on_next(&mut self, item: u32) {
        self.seen.lock().unwrap().push(item);
        if let Some(sub) = self.subscription.lock().unwrap().as_ref() {
            sub.unsubscribe();
        }
    }

    fn on_error(&mut self, _error: NormalizeError) {}

    fn on_completed(&mut self) {}
}

#[test]
fn unsubscribe_from_inside_a_callback_does_not_deadlock() -> Result<()> {
    let scheduler = TestScheduler::new();
    let subject = PublishSubject::<u32, NormalizeError>::new();
    let slot = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sub = subject
        .clone()
        .normalize_on(Duration::from_secs(1), scheduler.shared())?
        .subscribe_with(SelfCancelling { subscription: Arc::clone(&slot), seen: Arc::clone(&seen) });
    *slot.lock().unwrap() = Some(sub.clone());

    subject.on_next(1);
    subject.on_next(2);
    scheduler.advance_time_by(Duration::from_secs(3));

    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert!(sub.is_unsubscribed());
    assert_eq!(scheduler.pending_tasks(), 0);
    Ok(())
}

#[test]
fn unsubscribe_from_inside_a_tick_delivery_does_not_deadlock() -> Result<()> {
    let scheduler = TestScheduler::new();
    let subject = PublishSubject::<u32, NormalizeError>::new();
    let slot = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sub = subject
        .clone()
        .normalize_on(Duration::from_secs(1), scheduler.shared())?
        .subscribe_with(SelfCancelling { subscription: Arc::clone(&slot), seen: Arc::clone(&seen) });

    subject.on_next(1);
    subject.on_next(2);
    subject.on_next(3);
    // Arm the self-cancel only after the first item went through.
    *slot.lock().unwrap() = Some(sub.clone());

    scheduler.advance_time_by(Duration::from_secs(5));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert!(!subject.has_observers());
    Ok(())
}

#[mark_flaky_tests::flaky]
#[test]
fn unsubscribe_racing_a_tick_stops_delivery() {
    let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::new(2).unwrap());
    for _ in 0..20 {
        let subject = PublishSubject::<u32, NormalizeError>::new();
        let out = RecordingObserver::new();
        let sub = subject
            .clone()
            .normalize_on(Duration::from_millis(3), Arc::clone(&scheduler))
            .unwrap()
            .subscribe_with(out.clone());

        for i in 0..4 {
            subject.on_next(i);
        }
        thread::sleep(Duration::from_millis(3));
        sub.unsubscribe();
        let settled = out.len();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(out.len(), settled, "delivery after unsubscribe returned");
    }
}

#[test]
fn default_scheduler_is_usable() -> Result<()> {
    let subject = PublishSubject::<u32, NormalizeError>::new();
    let out = RecordingObserver::new();
    let _sub = subject.clone().normalize(Duration::from_millis(10))?.subscribe_with(out.clone());

    subject.on_next(1);
    subject.on_next(2);
    subject.on_completed();
    assert_eq!(out.take_next(), 1);
    assert!(wait_for_terminal(&out, Duration::from_secs(5)));
    assert_eq!(out.take_next(), 2);
    out.assert_completed();
    Ok(())
}

#[test]
fn unbounded_window_on_the_thread_scheduler_forwards_the_first_item() -> Result<()> {
    let scheduler = Arc::new(ThreadScheduler::new(1)?);
    let subject = PublishSubject::<u32, NormalizeError>::new();
    let out = RecordingObserver::new();
    let _sub = subject
        .clone()
        .normalize_on(Duration::MAX, scheduler.clone())?
        .subscribe_with(out.clone());

    subject.on_next(1);
    subject.on_next(2);
    assert_eq!(out.take_next(), 1);
    assert_eq!(scheduler.pending_tasks(), 1);

    thread::sleep(Duration::from_millis(30));
    out.assert_no_more_events();
    Ok(())
}
