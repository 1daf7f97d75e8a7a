use std::time::Duration;

use verify_types::{ErrorExpectation, UsageError, VirtualInstant};

use crate::script::{Script, validate_request_amount, validate_terminal_append};
use crate::step::ScriptStep;

/// Two-phase builder for a [`Script`].
///
/// In the *sequence phase* (this type) any step may be added. Adding a
/// terminal step (`expect_complete`, `expect_error*`, `then_cancel`)
/// consumes the builder and returns the finished, immutable [`Script`] —
/// there is no separate "built phase" type because the type system
/// already prevents further use of a consumed builder.
pub struct ScriptBuilder<T, E> {
    steps: Vec<ScriptStep<T, E>>,
    initial_demand: u64,
}

impl<T, E> ScriptBuilder<T, E> {
    /// Start a new script with the given baseline demand, requested on
    /// subscribe. `n >= 0`, so any `u64` is valid.
    pub fn new(initial_demand: u64) -> Self {
        Self {
            steps: Vec::new(),
            initial_demand,
        }
    }

    fn push_non_terminal(mut self, step: ScriptStep<T, E>) -> Result<Self, UsageError> {
        validate_terminal_append(&self.steps, &step)?;
        self.steps.push(step);
        Ok(self)
    }

    /// Match the next `values.len()` signals as `Next` with payloads
    /// structurally equal to `values`, in order. A no-op if `values` is
    /// empty.
    pub fn expect_next_equal(self, values: Vec<T>) -> Result<Self, UsageError>
    where
        T: PartialEq + Send + 'static,
    {
        self.expect_next_equal_by(values, |a, b| a == b)
    }

    /// As [`Self::expect_next_equal`], with a caller-supplied equality.
    pub fn expect_next_equal_by(
        self,
        values: Vec<T>,
        eq: impl Fn(&T, &T) -> bool + Send + 'static,
    ) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::ExpectNextEqual {
            values,
            eq: Box::new(eq),
        })
    }

    /// Match one `Next` whose value satisfies `predicate`.
    pub fn expect_next_matches(
        self,
        predicate: impl Fn(&T) -> bool + Send + 'static,
    ) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::ExpectNextPredicate(Box::new(predicate)))
    }

    /// Match one `Next`; invoke `consumer`. A panic inside `consumer` is
    /// caught and recorded as a script failure at this step.
    pub fn expect_next_consume(
        self,
        consumer: impl Fn(&T) + Send + 'static,
    ) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::ExpectNextConsume(Box::new(consumer)))
    }

    /// Match `n` `Next` signals without inspecting their values. Matches
    /// immediately with no dequeue when `n == 0`.
    pub fn expect_next_count(self, n: u64) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::ExpectNextCount(n))
    }

    /// Add `n` to the outstanding demand and forward `request(n)`. `n`
    /// must be `>= 1`.
    pub fn then_request(self, n: u64) -> Result<Self, UsageError> {
        validate_request_amount(n)?;
        self.push_non_terminal(ScriptStep::ThenRequest(n))
    }

    /// Execute `task` on the driver thread. A panic, or an `Err`
    /// returned by `task`, surfaces as a script failure but does not
    /// terminate the script.
    pub fn then_run(
        self,
        task: impl FnMut() -> Result<(), String> + Send + 'static,
    ) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::ThenRun(Box::new(task)))
    }

    /// Advance the virtual clock by `d`. Only valid when virtual time is
    /// enabled; checked at verification time, not here, since the global
    /// toggle may still change before `verify()` runs.
    pub fn advance_time_by(self, d: Duration) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::AdvanceTimeBy(d))
    }

    /// Advance the virtual clock to `t`.
    pub fn advance_time_to(self, t: VirtualInstant) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::AdvanceTimeTo(t))
    }

    /// Advance the virtual clock to the earliest future scheduled
    /// instant, or leave it unchanged if nothing is pending.
    pub fn advance_time(self) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::AdvanceTime)
    }

    /// Advance the virtual clock by `d` and fail if any signal arrived
    /// during that window.
    pub fn expect_no_event(self, d: Duration) -> Result<Self, UsageError> {
        self.push_non_terminal(ScriptStep::ExpectNoEvent(d))
    }

    fn finish(mut self, step: ScriptStep<T, E>) -> Result<Script<T, E>, UsageError> {
        validate_terminal_append(&self.steps, &step)?;
        self.steps.push(step);
        Ok(Script {
            steps: self.steps,
            initial_demand: self.initial_demand,
        })
    }

    /// Terminate the script expecting one `Complete` signal.
    pub fn expect_complete(self) -> Result<Script<T, E>, UsageError> {
        self.finish(ScriptStep::ExpectComplete)
    }

    /// Terminate the script expecting one `Error` signal matching `kind`.
    pub fn expect_error(self, kind: ErrorExpectation<E>) -> Result<Script<T, E>, UsageError> {
        self.finish(ScriptStep::ExpectError(kind))
    }

    /// Terminate the script by cancelling the subscription.
    pub fn then_cancel(self) -> Result<Script<T, E>, UsageError> {
        self.finish(ScriptStep::ThenCancel)
    }
}
