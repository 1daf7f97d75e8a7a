//! Subscriber implementation and driver loop — the core of the crate.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use verify_script::{Script, ScriptStep};
use verify_types::{ErrorExpectation, Publisher, Signal, Subscriber, Subscription, UsageError, VerifyError};

use crate::queue::{channel, SignalQueue, SignalQueueReceiver};
use crate::virtual_time::VirtualScheduler;

/// State shared between the driver thread and whatever thread(s) the
/// publisher's scheduler calls back on.
struct ShimState<T, E> {
    // Wrapped in a `Mutex` purely so the type is `Sync` — the lock is
    // never contended beyond a single `send`, since reactive-streams
    // serializes calls per subscription.
    queue: Mutex<SignalQueue<T, E>>,
    initial_demand: u64,
    subscribed: AtomicBool,
    early_failures: Mutex<Vec<String>>,
}

struct SubscriberHandle<T, E> {
    shim: Arc<ShimState<T, E>>,
}

impl<T: Send, E: Send> Subscriber<T> for SubscriberHandle<T, E> {
    type Error = E;

    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        if self.shim.subscribed.swap(true, Ordering::SeqCst) {
            warn!("received onSubscribe on an already-subscribed engine; cancelling");
            self.shim.early_failures.lock().unwrap_or_else(|e| e.into_inner()).push(
                "received a second onSubscribe for an already-subscribed engine".to_string(),
            );
            subscription.cancel();
            return;
        }
        if self.shim.initial_demand > 0 {
            trace!(n = self.shim.initial_demand, "requesting initial demand");
            subscription.request(self.shim.initial_demand);
        }
        self.shim
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .enqueue(Signal::Subscribed(subscription));
    }

    fn on_next(&self, value: T) {
        self.shim.queue.lock().unwrap_or_else(|e| e.into_inner()).enqueue(Signal::Next(value));
    }

    fn on_error(&self, error: E) {
        self.shim.queue.lock().unwrap_or_else(|e| e.into_inner()).enqueue(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.shim.queue.lock().unwrap_or_else(|e| e.into_inner()).enqueue(Signal::Complete);
    }
}

/// The scripted verifier. One instance drives exactly one subscription
/// to exactly one publisher through exactly one `verify` call.
pub struct Verifier<T, E> {
    script: Mutex<Option<Script<T, E>>>,
    shim: Arc<ShimState<T, E>>,
    queue_rx: Mutex<Option<SignalQueueReceiver<T, E>>>,
    virtual_time_enabled: bool,
    verified: AtomicBool,
    subscribe_called: AtomicBool,
}

impl<T, E> Verifier<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(script: Script<T, E>) -> Self {
        let (tx, rx) = channel();
        let shim = Arc::new(ShimState {
            queue: Mutex::new(tx),
            initial_demand: script.initial_demand(),
            subscribed: AtomicBool::new(false),
            early_failures: Mutex::new(Vec::new()),
        });
        Verifier {
            script: Mutex::new(Some(script)),
            shim,
            queue_rx: Mutex::new(Some(rx)),
            virtual_time_enabled: VirtualScheduler::global().is_enabled(),
            verified: AtomicBool::new(false),
            subscribe_called: AtomicBool::new(false),
        }
    }

    /// Subscribe this engine to `publisher`. May be called at most once.
    pub fn subscribe_to<P>(&self, publisher: &P) -> Result<(), UsageError>
    where
        P: Publisher<T, Error = E>,
    {
        if self.subscribe_called.swap(true, Ordering::SeqCst) {
            return Err(UsageError::AlreadySubscribed);
        }
        let handle = SubscriberHandle {
            shim: self.shim.clone(),
        };
        publisher.subscribe(Box::new(handle));
        Ok(())
    }
}

impl<T, E> Verifier<T, E>
where
    T: std::fmt::Debug + Send + 'static,
    E: std::fmt::Debug + std::fmt::Display + Send + 'static,
{
    /// Run the driver loop to terminal state. `deadline` bounds the
    /// total wait across every signal dequeue; `None` blocks
    /// indefinitely.
    pub(crate) fn run(&self, deadline: Option<Instant>) -> Result<Duration, VerifyError> {
        if self.verified.swap(true, Ordering::SeqCst) {
            return Err(VerifyError::Usage(UsageError::DoubleVerify));
        }
        if !self.subscribe_called.load(Ordering::SeqCst) {
            return Err(VerifyError::Usage(UsageError::NoSubscription));
        }

        let script = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("script taken more than once despite the verified guard");
        let rx = self
            .queue_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("queue receiver taken more than once despite the verified guard");

        let start = Instant::now();
        let mut steps = script.into_steps();
        let mut failures: Vec<String> = self
            .shim
            .early_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        let mut cursor = 0usize;
        let mut demand_outstanding = self.shim.initial_demand;
        let mut subscription: Option<Box<dyn Subscription>> = None;
        let mut terminated = false;

        macro_rules! dequeue_or_timeout {
            () => {{
                match next_signal(&rx, &mut subscription, deadline) {
                    Some(signal) => signal,
                    None => {
                        failures.push(format!(
                            "timed out waiting for {}",
                            steps[cursor].expectation_name()
                        ));
                        if let Some(sub) = &subscription {
                            sub.cancel();
                        }
                        terminated = true;
                        break;
                    }
                }
            }};
        }

        while !terminated && cursor < steps.len() {
            if steps[cursor].is_control() {
                execute_control_step(
                    &mut steps[cursor],
                    &subscription,
                    &mut demand_outstanding,
                    &mut failures,
                    self.virtual_time_enabled,
                    &rx,
                )
                .map_err(VerifyError::Usage)?;
                if matches!(steps[cursor], ScriptStep::ThenCancel) {
                    terminated = true;
                }
                cursor += 1;
                continue;
            }

            match &steps[cursor] {
                ScriptStep::ExpectNextCount(0) => {
                    cursor += 1;
                    continue;
                }
                ScriptStep::ExpectComplete | ScriptStep::ExpectError(_) => {
                    loop {
                        let signal = dequeue_or_timeout!();
                        match (&steps[cursor], &signal) {
                            (ScriptStep::ExpectComplete, Signal::Complete) => {
                                terminated = true;
                                break;
                            }
                            (ScriptStep::ExpectComplete, Signal::Error(e)) => {
                                failures.push(format!("expected Complete, got Error({e})"));
                                terminated = true;
                                break;
                            }
                            (ScriptStep::ExpectError(kind), Signal::Error(e)) => {
                                if let Err(msg) = classify_error(kind, e) {
                                    failures.push(msg);
                                }
                                terminated = true;
                                break;
                            }
                            (ScriptStep::ExpectError(_), Signal::Complete) => {
                                failures.push("expected Error, got Complete".to_string());
                                terminated = true;
                                break;
                            }
                            (_, Signal::Next(v)) => {
                                failures.push(format!(
                                    "expected {}, got Next({v:?})",
                                    steps[cursor].expectation_name()
                                ));
                                // not terminal: keep waiting at the same step.
                            }
                            (_, Signal::Subscribed(_)) => unreachable!(
                                "next_signal absorbs Subscribed signals before returning"
                            ),
                        }
                    }
                    cursor += 1;
                }
                ScriptStep::ExpectNextPredicate(_) | ScriptStep::ExpectNextConsume(_) => {
                    let signal = dequeue_or_timeout!();
                    match signal {
                        Signal::Next(v) => {
                            demand_outstanding = demand_outstanding.saturating_sub(1);
                            match &steps[cursor] {
                                ScriptStep::ExpectNextPredicate(p) => {
                                    if !p(&v) {
                                        failures.push(format!(
                                            "expected Next matching predicate, got Next({v:?})"
                                        ));
                                    }
                                }
                                ScriptStep::ExpectNextConsume(c) => {
                                    if let Err(payload) =
                                        catch_unwind(AssertUnwindSafe(|| c(&v)))
                                    {
                                        failures.push(format!(
                                            "expectNextConsume task panicked: {}",
                                            panic_message(payload)
                                        ));
                                    }
                                }
                                _ => unreachable!(),
                            }
                            cursor += 1;
                        }
                        terminal => {
                            handle_unexpected_terminal(
                                &steps,
                                cursor,
                                terminal,
                                &mut failures,
                            );
                            terminated = true;
                        }
                    }
                }
                ScriptStep::ExpectNextEqual { .. } => {
                    let width = match &steps[cursor] {
                        ScriptStep::ExpectNextEqual { values, .. } => values.len(),
                        _ => unreachable!(),
                    };
                    let mut idx = 0;
                    while idx < width {
                        let signal = dequeue_or_timeout!();
                        match signal {
                            Signal::Next(v) => {
                                demand_outstanding = demand_outstanding.saturating_sub(1);
                                let mismatch = match &steps[cursor] {
                                    ScriptStep::ExpectNextEqual { values, eq } => {
                                        !eq(&values[idx], &v)
                                    }
                                    _ => unreachable!(),
                                };
                                if mismatch {
                                    if let ScriptStep::ExpectNextEqual { values, .. } =
                                        &steps[cursor]
                                    {
                                        failures.push(format!(
                                            "expected Next({:?}), got Next({v:?})",
                                            values[idx]
                                        ));
                                    }
                                }
                                idx += 1;
                            }
                            terminal => {
                                handle_unexpected_terminal(
                                    &steps,
                                    cursor,
                                    terminal,
                                    &mut failures,
                                );
                                terminated = true;
                                break;
                            }
                        }
                    }
                    if !terminated {
                        cursor += 1;
                    }
                }
                ScriptStep::ExpectNextCount(n) => {
                    let n = *n;
                    let mut consumed = 0u64;
                    while consumed < n {
                        let signal = dequeue_or_timeout!();
                        match signal {
                            Signal::Next(_) => {
                                demand_outstanding = demand_outstanding.saturating_sub(1);
                                consumed += 1;
                            }
                            terminal => {
                                handle_unexpected_terminal(
                                    &steps,
                                    cursor,
                                    terminal,
                                    &mut failures,
                                );
                                terminated = true;
                                break;
                            }
                        }
                    }
                    if !terminated {
                        cursor += 1;
                    }
                }
                ScriptStep::ThenRequest(_)
                | ScriptStep::ThenCancel
                | ScriptStep::ThenRun(_)
                | ScriptStep::AdvanceTimeBy(_)
                | ScriptStep::AdvanceTimeTo(_)
                | ScriptStep::AdvanceTime
                | ScriptStep::ExpectNoEvent(_) => unreachable!("handled by is_control branch above"),
            }
        }

        debug!(
            cursor,
            demand_outstanding,
            failures = failures.len(),
            "verification driver loop finished"
        );

        let elapsed = start.elapsed();
        if failures.is_empty() {
            Ok(elapsed)
        } else {
            Err(VerifyError::assertion_failure(failures))
        }
    }
}

/// Dequeue the next real signal, transparently absorbing `Subscribed`
/// into `subscription` — the script has no step that consumes it
/// explicitly.
fn next_signal<T, E>(
    rx: &SignalQueueReceiver<T, E>,
    subscription: &mut Option<Box<dyn Subscription>>,
    deadline: Option<Instant>,
) -> Option<Signal<T, E>> {
    loop {
        match rx.dequeue(deadline) {
            Some(Signal::Subscribed(sub)) => {
                *subscription = Some(sub);
                continue;
            }
            other => return other,
        }
    }
}

fn classify_error<E: std::fmt::Display>(kind: &ErrorExpectation<E>, error: &E) -> Result<(), String> {
    match kind {
        ErrorExpectation::Any => Ok(()),
        ErrorExpectation::OfType(classifier) | ErrorExpectation::Predicate(classifier) => {
            if classifier(error) {
                Ok(())
            } else {
                Err(format!(
                    "expected Error matching {}, got Error({error})",
                    kind.kind_name()
                ))
            }
        }
        ErrorExpectation::Message(expected) => {
            let observed = error.to_string();
            if &observed == expected {
                Ok(())
            } else {
                Err(format!(
                    "expected Error with message {expected:?}, got {observed:?}"
                ))
            }
        }
        ErrorExpectation::Consume(consumer) => consumer(error),
    }
}

fn handle_unexpected_terminal<T: std::fmt::Debug, E: std::fmt::Debug>(
    steps: &[ScriptStep<T, E>],
    cursor: usize,
    terminal: Signal<T, E>,
    failures: &mut Vec<String>,
) {
    failures.push(format!(
        "missing value: expected {}, but publisher terminated early with {}",
        steps[cursor].expectation_name(),
        terminal.kind_name()
    ));
    let last = steps.len() - 1;
    for step in &steps[cursor + 1..last.max(cursor)] {
        if !step.is_control() {
            failures.push(format!(
                "missing value: expected {}, but publisher terminated early with {}",
                step.expectation_name(),
                terminal.kind_name()
            ));
        }
    }
    match (&steps[last], &terminal) {
        (ScriptStep::ExpectComplete, Signal::Complete) => {}
        (ScriptStep::ExpectComplete, Signal::Error(e)) => {
            failures.push(format!("expected Complete, got Error({e:?})"));
        }
        (ScriptStep::ExpectError(_), Signal::Complete) => {
            failures.push("expected Error, got Complete".to_string());
        }
        (ScriptStep::ExpectError(_), Signal::Error(_)) => {
            // Already reported as a missing-value failure above; the
            // classifier is not re-run once a prior expectation in the
            // script has already been violated.
        }
        (ScriptStep::ThenCancel, _) => {
            failures.push(format!(
                "expected thenCancel to run, but publisher terminated first with {}",
                terminal.kind_name()
            ));
        }
        _ => {}
    }
}

fn execute_control_step<T, E>(
    step: &mut ScriptStep<T, E>,
    subscription: &Option<Box<dyn Subscription>>,
    demand_outstanding: &mut u64,
    failures: &mut Vec<String>,
    virtual_time_enabled: bool,
    rx: &SignalQueueReceiver<T, E>,
) -> Result<(), UsageError> {
    match step {
        ScriptStep::ThenRequest(n) => {
            *demand_outstanding += *n;
            match subscription {
                Some(sub) => sub.request(*n),
                None => failures.push("thenRequest issued before a subscription was established".to_string()),
            }
        }
        ScriptStep::ThenCancel => {
            if let Some(sub) = subscription {
                sub.cancel();
            }
        }
        ScriptStep::ThenRun(task) => match catch_unwind(AssertUnwindSafe(|| task())) {
            Ok(Ok(())) => {}
            Ok(Err(msg)) => failures.push(format!("thenRun task failed: {msg}")),
            Err(payload) => failures.push(format!("thenRun task panicked: {}", panic_message(payload))),
        },
        ScriptStep::AdvanceTimeBy(d) => {
            failures.extend(advance_virtual_time(virtual_time_enabled, |s| s.advance_by(*d))?);
        }
        ScriptStep::AdvanceTimeTo(t) => {
            failures.extend(advance_virtual_time(virtual_time_enabled, |s| s.advance_to(*t))?);
        }
        ScriptStep::AdvanceTime => {
            failures.extend(advance_virtual_time(virtual_time_enabled, |s| {
                match s.earliest_pending() {
                    Some(t) => s.advance_to(t),
                    None => Ok(Vec::new()),
                }
            })?);
        }
        ScriptStep::ExpectNoEvent(d) => {
            if virtual_time_enabled {
                failures.extend(advance_virtual_time(true, |s| s.advance_by(*d))?);
            }
            let deadline = if virtual_time_enabled {
                Instant::now()
            } else {
                Instant::now() + *d
            };
            if let Some(signal) = rx.dequeue(Some(deadline)) {
                failures.push(format!(
                    "expected no event within {d:?}, but observed {}",
                    signal.kind_name()
                ));
            }
        }
        _ => unreachable!("non-control step passed to execute_control_step"),
    }
    Ok(())
}

/// Raises `UsageError::VirtualTimeDisabled` synchronously rather than
/// recording it as a script failure — a usage error short-circuits the
/// whole run instead of being folded into the aggregate. Panics from
/// scheduled tasks, by contrast, are genuine script failures and flow
/// back as the `Ok` payload for the caller to aggregate.
fn advance_virtual_time(
    enabled: bool,
    advance: impl FnOnce(&VirtualScheduler) -> Result<Vec<String>, UsageError>,
) -> Result<Vec<String>, UsageError> {
    if !enabled {
        return Err(UsageError::VirtualTimeDisabled);
    }
    advance(VirtualScheduler::global())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
