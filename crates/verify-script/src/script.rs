use verify_types::UsageError;

use crate::step::ScriptStep;

/// An immutable, ordered sequence of steps accumulated by the builder,
/// plus the baseline demand requested on subscribe.
///
/// Construction is only possible through [`crate::builder::ScriptBuilder`],
/// which enforces that a script is not runnable unless its last step is
/// terminal before a `Script` value can exist at all.
pub struct Script<T, E> {
    pub(crate) steps: Vec<ScriptStep<T, E>>,
    pub(crate) initial_demand: u64,
}

impl<T, E> Script<T, E> {
    pub fn initial_demand(&self) -> u64 {
        self.initial_demand
    }

    pub fn steps(&self) -> &[ScriptStep<T, E>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Consume the script, handing ownership of its steps to the driver.
    /// Some steps (`ThenRun`) carry a `FnMut` task that the driver must
    /// call through a mutable borrow, which an immutable `&[ScriptStep]`
    /// view cannot provide.
    pub fn into_steps(self) -> Vec<ScriptStep<T, E>> {
        self.steps
    }
}

/// Validate that `steps` would be an acceptable finished script: exactly
/// one terminal step, appearing last, and `thenCancel` never appearing
/// anywhere but in that final position.
///
/// Run once, at the point the builder commits a terminal step, rather
/// than after every push — checks incrementally against the step about
/// to be appended instead of rescanning the whole sequence.
pub(crate) fn validate_terminal_append<T, E>(
    steps: &[ScriptStep<T, E>],
    incoming: &ScriptStep<T, E>,
) -> Result<(), UsageError> {
    if steps.iter().any(ScriptStep::is_terminal) {
        return Err(UsageError::TerminalStepAlreadyPresent);
    }
    if matches!(incoming, ScriptStep::ThenCancel) {
        // thenCancel is always valid as the step that terminates the
        // script; the "must be last" rule is enforced by construction
        // since no further step can follow a terminal one.
        return Ok(());
    }
    Ok(())
}

pub(crate) fn validate_request_amount(n: u64) -> Result<(), UsageError> {
    if n < 1 {
        return Err(UsageError::InvalidRequestAmount { n });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> ScriptStep<u32, String> {
        ScriptStep::ExpectNextCount(1)
    }

    #[test]
    fn rejects_step_after_terminal_already_present() {
        let steps: Vec<ScriptStep<u32, String>> = vec![ScriptStep::ExpectComplete];
        let err = validate_terminal_append(&steps, &step()).unwrap_err();
        assert_eq!(err, UsageError::TerminalStepAlreadyPresent);
    }

    #[test]
    fn accepts_non_terminal_append_when_no_terminal_yet() {
        let steps: Vec<ScriptStep<u32, String>> = vec![];
        assert!(validate_terminal_append(&steps, &step()).is_ok());
    }

    #[test]
    fn request_amount_below_one_is_rejected() {
        assert_eq!(
            validate_request_amount(0).unwrap_err(),
            UsageError::InvalidRequestAmount { n: 0 }
        );
    }

    #[test]
    fn request_amount_of_one_is_accepted() {
        assert!(validate_request_amount(1).is_ok());
    }
}
