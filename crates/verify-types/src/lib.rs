pub mod contract;
pub mod error;
pub mod error_expectation;
pub mod signal;
pub mod time;

pub use contract::{Publisher, Subscriber, Subscription};
pub use error::{UsageError, VerifyError};
pub use error_expectation::ErrorExpectation;
pub use signal::Signal;
pub use time::VirtualInstant;
