use std::time::Duration;

use verify_types::{ErrorExpectation, VirtualInstant};

/// A single step of a script.
///
/// The set of variants is closed: adding a new kind of step means adding
/// a variant here and handling it everywhere this type is matched.
pub enum ScriptStep<T, E> {
    /// Match the next `vs.len()` signals as `Next` with payloads equal to
    /// `vs` in order, via `eq`.
    ExpectNextEqual {
        values: Vec<T>,
        eq: Box<dyn Fn(&T, &T) -> bool + Send>,
    },
    /// Match one `Next` whose value satisfies the predicate.
    ExpectNextPredicate(Box<dyn Fn(&T) -> bool + Send>),
    /// Match one `Next`; invoke the consumer. A panic inside the consumer
    /// is caught and recorded as a script failure at this step.
    ExpectNextConsume(Box<dyn Fn(&T) + Send>),
    /// Match `n` `Next` signals without inspecting their values.
    ExpectNextCount(u64),
    /// Match one `Complete`.
    ExpectComplete,
    /// Match one `Error` according to `kind`.
    ExpectError(ErrorExpectation<E>),
    /// Add `n` to the outstanding demand and forward `request(n)`.
    ThenRequest(u64),
    /// Cancel the subscription. Terminal; must be the last step.
    ThenCancel,
    /// Execute an opaque side-effecting task on the driver thread. A
    /// panic, or an `Err`, is recorded as a script failure but does not
    /// terminate the script.
    ThenRun(Box<dyn FnMut() -> Result<(), String> + Send>),
    /// Advance the virtual clock by `d`.
    AdvanceTimeBy(Duration),
    /// Advance the virtual clock to `t`.
    AdvanceTimeTo(VirtualInstant),
    /// Advance the virtual clock to the earliest future scheduled instant.
    AdvanceTime,
    /// Advance the virtual clock by `d` and fail if any signal arrived
    /// during that window.
    ExpectNoEvent(Duration),
}

impl<T, E> ScriptStep<T, E> {
    /// Whether this step, once matched, closes the script: it expects a
    /// termination signal, or it cancels the subscription outright.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScriptStep::ExpectComplete | ScriptStep::ExpectError(_) | ScriptStep::ThenCancel
        )
    }

    /// Whether this step is a control step: it consumes no signal from
    /// the queue and is executed purely for its side effect.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            ScriptStep::ThenRequest(_)
                | ScriptStep::ThenCancel
                | ScriptStep::ThenRun(_)
                | ScriptStep::AdvanceTimeBy(_)
                | ScriptStep::AdvanceTimeTo(_)
                | ScriptStep::AdvanceTime
                | ScriptStep::ExpectNoEvent(_)
        )
    }

    /// Short name used in failure messages ("expected Next, got Complete").
    pub fn expectation_name(&self) -> &'static str {
        match self {
            ScriptStep::ExpectNextEqual { .. } => "Next",
            ScriptStep::ExpectNextPredicate(_) => "Next",
            ScriptStep::ExpectNextConsume(_) => "Next",
            ScriptStep::ExpectNextCount(_) => "Next",
            ScriptStep::ExpectComplete => "Complete",
            ScriptStep::ExpectError(_) => "Error",
            ScriptStep::ThenRequest(_) => "ThenRequest",
            ScriptStep::ThenCancel => "ThenCancel",
            ScriptStep::ThenRun(_) => "ThenRun",
            ScriptStep::AdvanceTimeBy(_) => "AdvanceTimeBy",
            ScriptStep::AdvanceTimeTo(_) => "AdvanceTimeTo",
            ScriptStep::AdvanceTime => "AdvanceTime",
            ScriptStep::ExpectNoEvent(_) => "ExpectNoEvent",
        }
    }
}
