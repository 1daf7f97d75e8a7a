//! The reactive-streams contract the engine consumes.
//!
//! These three traits are the only surface through which a publisher and
//! the verification engine communicate. A publisher is never inspected or
//! driven by any other means.

/// Handle issued by a publisher granting the subscriber the ability to
/// request values or cancel. Implementations must be safe to call from
/// whatever thread the publisher's scheduler uses.
pub trait Subscription: Send {
    /// Authorize the delivery of up to `n` further `Next` signals.
    fn request(&self, n: u64);

    /// Signal that no further values are wanted. Idempotent.
    fn cancel(&self);
}

/// Receiver of a publisher's signals.
///
/// At most one `on_subscribe` call, first; zero or more `on_next` calls
/// up to the cumulative requested demand; optionally one terminal call
/// to `on_error` or `on_complete`. Implementations must not block
/// beyond a wait-free enqueue.
///
/// `Sync` as well as `Send`: a publisher's scheduler may hand the same
/// subscriber handle to callbacks running on different threads over
/// time (e.g. behind an `Arc`), so implementations must tolerate shared
/// access from whatever thread the scheduler picks.
pub trait Subscriber<T>: Send + Sync {
    /// Error type this subscriber can be terminated with.
    type Error;

    fn on_subscribe(&self, subscription: Box<dyn Subscription>);
    fn on_next(&self, value: T);
    fn on_error(&self, error: Self::Error);
    fn on_complete(&self);
}

/// Producer of a potentially asynchronous sequence of typed values,
/// terminated by completion or error.
pub trait Publisher<T> {
    type Error;

    fn subscribe(&self, subscriber: Box<dyn Subscriber<T, Error = Self::Error>>);
}
