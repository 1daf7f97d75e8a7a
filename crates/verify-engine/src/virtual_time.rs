//! Deterministic clock + priority queue of scheduled tasks.
//!
//! Process-wide, explicit-lifecycle singleton. There is no background
//! thread: the clock only moves when a test explicitly calls
//! `advance_to`/`advance_by`, which is the entire point of virtual time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use verify_types::{UsageError, VirtualInstant};

type Task = Box<dyn FnOnce() + Send>;

struct ScheduledTask {
    due: VirtualInstant,
    /// Tie-break for equal `due` instants: insertion order, stable.
    seq: u64,
    task: Task,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for ScheduledTask {}
impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Default)]
struct SchedulerState {
    enabled: bool,
    now: VirtualInstant,
    next_seq: u64,
    // Min-heap by (due, seq) via `Reverse`.
    tasks: BinaryHeap<Reverse<ScheduledTask>>,
}

/// Process-wide virtual-time scheduler.
///
/// `enable`/`disable` give this an explicit install/uninstall lifecycle
/// rather than a constructor: the scheduler is a single global because
/// the publisher under test reads the clock and schedules callbacks
/// through the same process-wide instance the verifier advances.
pub struct VirtualScheduler {
    state: Mutex<SchedulerState>,
}

static GLOBAL: OnceLock<VirtualScheduler> = OnceLock::new();

impl VirtualScheduler {
    pub fn global() -> &'static VirtualScheduler {
        GLOBAL.get_or_init(|| VirtualScheduler {
            state: Mutex::new(SchedulerState::default()),
        })
    }

    /// Install the virtual scheduler. Idempotent: a second call while
    /// already enabled leaves the clock and pending tasks untouched.
    ///
    /// `all_schedulers` is accepted for interface parity with
    /// publisher libraries that redirect more than one scheduler
    /// factory, but has no further effect here: this crate owns a
    /// single scheduler, not a registry of them.
    pub fn enable(&self, _all_schedulers: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.enabled {
            return;
        }
        *state = SchedulerState {
            enabled: true,
            ..SchedulerState::default()
        };
    }

    /// Uninstall and clear the priority queue.
    pub fn disable(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = SchedulerState::default();
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).enabled
    }

    pub fn now(&self) -> VirtualInstant {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).now
    }

    /// Register `task` to run when the clock reaches `now() + delay`.
    /// No-op (task dropped) if virtual time is disabled — a publisher
    /// under test should not be scheduling through the virtual clock
    /// when it has not been enabled.
    pub fn schedule_after(&self, delay: Duration, task: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.enabled {
            return;
        }
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.tasks.push(Reverse(ScheduledTask {
            due,
            seq,
            task: Box::new(task),
        }));
    }

    /// The earliest due instant strictly after `now()`, if any task is
    /// pending.
    pub fn earliest_pending(&self) -> Option<VirtualInstant> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tasks.peek().map(|Reverse(t)| t.due)
    }

    /// Run every task with due-time `<= t`, in due-time order (ties
    /// broken by insertion order). After returning, `now() == max(prev_now, t)`.
    ///
    /// Proceeds in rounds: each round advances `now` only to the next
    /// due instant (not straight to `t`) and runs every task due at
    /// that instant before checking the heap again. A task that
    /// reschedules itself (a recurring timer, say) computes its next
    /// due time relative to `now` at the moment it runs, so `now` must
    /// already sit at that task's own firing instant — jumping straight
    /// to `t` first would push the reschedule past `t` and only ever
    /// fire once per call, however many ticks `t` actually spans. Only
    /// once nothing remains due at or before `t` does `now` move to `t`
    /// itself.
    ///
    /// Returns the failure messages of any task that panicked — panics
    /// are isolated, so one misbehaving task does not stop the rest of
    /// the due set from running.
    pub fn advance_to(&self, t: VirtualInstant) -> Result<Vec<String>, UsageError> {
        let mut failures = Vec::new();
        loop {
            let due_tasks = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if !state.enabled {
                    return Err(UsageError::VirtualTimeDisabled);
                }
                let next_due = match state.tasks.peek() {
                    Some(Reverse(scheduled)) if scheduled.due <= t => scheduled.due,
                    _ => {
                        if t > state.now {
                            state.now = t;
                        }
                        break;
                    }
                };
                state.now = next_due;
                let mut due_tasks = Vec::new();
                while let Some(Reverse(scheduled)) = state.tasks.peek() {
                    if scheduled.due > next_due {
                        break;
                    }
                    let Reverse(scheduled) = state.tasks.pop().unwrap();
                    due_tasks.push(scheduled.task);
                }
                due_tasks
            };

            for task in due_tasks {
                if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
                    failures.push(panic_message(payload));
                }
            }
        }
        Ok(failures)
    }

    pub fn advance_by(&self, d: Duration) -> Result<Vec<String>, UsageError> {
        let target = self.now() + d;
        self.advance_to(target)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "scheduled task panicked".to_string()
    }
}
