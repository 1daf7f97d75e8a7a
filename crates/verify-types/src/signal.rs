use crate::contract::Subscription;

/// One signal received from a publisher.
///
/// `Subscribed` is produced exactly once per subscription by the
/// reactive-streams `on_subscribe` callback; the other three variants
/// correspond 1:1 to `on_next`/`on_error`/`on_complete`.
pub enum Signal<T, E> {
    Subscribed(Box<dyn Subscription>),
    Next(T),
    Error(E),
    Complete,
}

impl<T, E> Signal<T, E> {
    /// Short name used in failure messages ("expected Next, got Complete").
    pub fn kind_name(&self) -> &'static str {
        match self {
            Signal::Subscribed(_) => "Subscribed",
            Signal::Next(_) => "Next",
            Signal::Error(_) => "Error",
            Signal::Complete => "Complete",
        }
    }

    /// Whether this signal ends the subscription (`Error` or `Complete`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Signal::Error(_) | Signal::Complete)
    }
}

impl<T: std::fmt::Debug, E: std::fmt::Debug> std::fmt::Debug for Signal<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Subscribed(_) => write!(f, "Subscribed"),
            Signal::Next(v) => write!(f, "Next({v:?})"),
            Signal::Error(e) => write!(f, "Error({e:?})"),
            Signal::Complete => write!(f, "Complete"),
        }
    }
}
