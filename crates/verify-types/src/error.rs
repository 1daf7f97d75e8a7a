use thiserror::Error;

/// Misuse of the engine — raised immediately, synchronously, and never
/// folded into an aggregated assertion failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("engine was already subscribed to a publisher")]
    AlreadySubscribed,
    #[error("verify() was called twice on the same engine instance")]
    DoubleVerify,
    #[error("verify() called without a subscription and no publisher was given")]
    NoSubscription,
    #[error("virtual-time action attempted while virtual time is disabled")]
    VirtualTimeDisabled,
    #[error("thenRequest(n) requires n >= 1, got {n}")]
    InvalidRequestAmount { n: u64 },
    #[error("cannot add a step after a terminal step has already been supplied")]
    TerminalStepAlreadyPresent,
}

/// Top-level error returned by `verify()`.
///
/// Only two variants ever escape the driver: a usage error (synchronous
/// misuse) or an aggregated assertion failure collected over the whole
/// run.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("Expectation failure(s):\n{}", render_failures(.failures))]
    AssertionFailure { failures: Vec<String> },
}

fn render_failures(failures: &[String]) -> String {
    failures
        .iter()
        .map(|f| format!(" - {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl VerifyError {
    /// Build the aggregated-failure variant, preserving failure order.
    pub fn assertion_failure(failures: Vec<String>) -> Self {
        debug_assert!(!failures.is_empty(), "aggregated failure with no failures");
        VerifyError::AssertionFailure { failures }
    }
}
