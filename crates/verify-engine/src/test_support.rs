//! Minimal fake publishers used only by this crate's own tests to
//! exercise the driver end-to-end without depending on any real
//! reactive-streams publisher library.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use verify_types::{Publisher, Subscriber, Subscription};

use crate::virtual_time::VirtualScheduler;

struct NoopSubscription;
impl Subscription for NoopSubscription {
    fn request(&self, _n: u64) {}
    fn cancel(&self) {}
}

/// Emits a fixed sequence of values, then `Complete`, synchronously and
/// unconditionally on subscribe (ignores demand — fine for scenarios
/// that only check ordering, not backpressure).
pub struct VecPublisher<T> {
    values: Vec<T>,
}

impl<T> VecPublisher<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T: Clone> Publisher<T> for VecPublisher<T> {
    type Error = String;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<T, Error = String>>) {
        subscriber.on_subscribe(Box::new(NoopSubscription));
        for v in &self.values {
            subscriber.on_next(v.clone());
        }
        subscriber.on_complete();
    }
}

/// Emits a fixed sequence of values, then errors with `error`.
pub struct ErrorPublisher<T> {
    values: Vec<T>,
    error: String,
}

impl<T> ErrorPublisher<T> {
    pub fn new(values: Vec<T>, error: impl Into<String>) -> Self {
        Self {
            values,
            error: error.into(),
        }
    }
}

impl<T: Clone> Publisher<T> for ErrorPublisher<T> {
    type Error = String;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<T, Error = String>>) {
        subscriber.on_subscribe(Box::new(NoopSubscription));
        for v in &self.values {
            subscriber.on_next(v.clone());
        }
        subscriber.on_error(self.error.clone());
    }
}

struct DemandAwareSubscription<T> {
    state: Arc<Mutex<DemandAwareState<T>>>,
    subscriber: Arc<dyn Subscriber<T, Error = String>>,
}

struct DemandAwareState<T> {
    pending: VecDeque<T>,
    demand: u64,
    done: bool,
}

// The driver's `on_subscribe` may call `request` synchronously before
// returning, so `request`/`cancel` must never call back into the
// subscriber while holding `state`'s lock.
impl<T: Send + 'static> Subscription for DemandAwareSubscription<T> {
    /// Releases up to `n` buffered values immediately; completes once
    /// the buffer empties while demand is still outstanding. Values are
    /// collected before the lock is dropped, then delivered without
    /// holding it (the engine may re-enter `request` from inside
    /// `on_next`'s caller, e.g. a `thenRequest` step queued right after).
    fn request(&self, n: u64) {
        let (to_emit, completed) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.done {
                return;
            }
            state.demand += n;
            let mut to_emit = Vec::new();
            while state.demand > 0 {
                match state.pending.pop_front() {
                    Some(v) => {
                        state.demand -= 1;
                        to_emit.push(v);
                    }
                    None => break,
                }
            }
            let completed = state.pending.is_empty() && state.demand > 0;
            if completed {
                state.done = true;
            }
            (to_emit, completed)
        };
        for v in to_emit {
            self.subscriber.on_next(v);
        }
        if completed {
            self.subscriber.on_complete();
        }
    }

    fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.done = true;
        state.pending.clear();
    }
}

/// Emits `values` strictly honoring requested demand — buffers whatever
/// has not yet been authorized and releases it as `request(n)` arrives.
/// Completes once the buffer is drained after a request. Single-use
/// (test-only): `subscribe` takes the buffered values on first call.
pub struct DemandAwarePublisher<T> {
    values: Mutex<Option<Vec<T>>>,
}

impl<T> DemandAwarePublisher<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values: Mutex::new(Some(values)),
        }
    }
}

impl<T: Send + 'static> Publisher<T> for DemandAwarePublisher<T> {
    type Error = String;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<T, Error = String>>) {
        let subscriber: Arc<dyn Subscriber<T, Error = String>> = Arc::from(subscriber);
        let values = self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("DemandAwarePublisher subscribed more than once");
        let state = Arc::new(Mutex::new(DemandAwareState {
            pending: values.into_iter().collect::<VecDeque<_>>(),
            demand: 0,
            done: false,
        }));
        let subscription = Box::new(DemandAwareSubscription {
            state,
            subscriber: subscriber.clone(),
        });
        subscriber.on_subscribe(subscription);
    }
}

/// Scheduled via the virtual clock: emits one value after `delay`, then
/// completes.
pub struct DelayThenCompletePublisher<T> {
    delay: Duration,
    value: T,
}

impl<T> DelayThenCompletePublisher<T> {
    pub fn new(delay: Duration, value: T) -> Self {
        Self { delay, value }
    }
}

impl<T: Clone + Send + 'static> Publisher<T> for DelayThenCompletePublisher<T> {
    type Error = String;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<T, Error = String>>) {
        let subscriber: Arc<dyn Subscriber<T, Error = String>> = Arc::from(subscriber);
        subscriber.on_subscribe(Box::new(NoopSubscription));
        let value = self.value.clone();
        let s = subscriber.clone();
        VirtualScheduler::global().schedule_after(self.delay, move || {
            s.on_next(value);
            s.on_complete();
        });
    }
}

/// Scheduled via the virtual clock: emits `"t" + i` every `period`,
/// forever, until the subscription is cancelled.
pub struct IntervalPublisher {
    period: Duration,
}

impl IntervalPublisher {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

struct IntervalSubscription {
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl Subscription for IntervalSubscription {
    fn request(&self, _n: u64) {}
    fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Publisher<String> for IntervalPublisher {
    type Error = String;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<String, Error = String>>) {
        let subscriber: Arc<dyn Subscriber<String, Error = String>> = Arc::from(subscriber);
        let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        subscriber.on_subscribe(Box::new(IntervalSubscription {
            cancelled: cancelled.clone(),
        }));
        schedule_tick(subscriber, cancelled, self.period, 0);
    }
}

/// Emits `n` values spaced `period` apart using a real background
/// thread and real sleeps — used for tests that exercise a wall-clock
/// verification timeout, where virtual time would defeat the point.
pub struct RealTimeIntervalPublisher {
    period: Duration,
    n: u64,
}

impl RealTimeIntervalPublisher {
    pub fn new(period: Duration, n: u64) -> Self {
        Self { period, n }
    }
}

impl Publisher<String> for RealTimeIntervalPublisher {
    type Error = String;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<String, Error = String>>) {
        let subscriber: Arc<dyn Subscriber<String, Error = String>> = Arc::from(subscriber);
        subscriber.on_subscribe(Box::new(NoopSubscription));
        let period = self.period;
        let n = self.n;
        std::thread::spawn(move || {
            for i in 0..n {
                std::thread::sleep(period);
                subscriber.on_next("foo".to_string());
                let _ = i;
            }
            subscriber.on_complete();
        });
    }
}

fn schedule_tick(
    subscriber: Arc<dyn Subscriber<String, Error = String>>,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
    period: Duration,
    i: u64,
) {
    VirtualScheduler::global().schedule_after(period, move || {
        if cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        subscriber.on_next(format!("t{i}"));
        schedule_tick(subscriber, cancelled, period, i + 1);
    });
}
