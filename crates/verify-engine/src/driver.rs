//! Public verification entry points.

use std::time::{Duration, Instant};

use verify_types::{Publisher, VerifyError};

use crate::engine::Verifier;

impl<T, E> Verifier<T, E>
where
    T: std::fmt::Debug + Send + 'static,
    E: std::fmt::Debug + std::fmt::Display + Send + 'static,
{
    /// Run the script to completion against a publisher subscribed
    /// externally via [`Self::subscribe_to`]. Blocks until the script
    /// reaches a terminal state.
    pub fn verify(&self) -> Result<Duration, VerifyError> {
        self.run(None)
    }

    /// As [`Self::verify`], bounded by `timeout`: a signal wait past the
    /// deadline is recorded as a timeout failure and the subscription is
    /// cancelled.
    pub fn verify_with_timeout(&self, timeout: Duration) -> Result<Duration, VerifyError> {
        self.run(Some(Instant::now() + timeout))
    }

    /// Subscribe to `publisher`, then run [`Self::verify`].
    pub fn verify_publisher<P>(&self, publisher: &P) -> Result<Duration, VerifyError>
    where
        P: Publisher<T, Error = E>,
    {
        self.subscribe_to(publisher)?;
        self.verify()
    }

    /// Subscribe to `publisher`, then run [`Self::verify_with_timeout`].
    pub fn verify_publisher_with_timeout<P>(
        &self,
        publisher: &P,
        timeout: Duration,
    ) -> Result<Duration, VerifyError>
    where
        P: Publisher<T, Error = E>,
    {
        self.subscribe_to(publisher)?;
        self.verify_with_timeout(timeout)
    }
}
