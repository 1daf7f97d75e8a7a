/// How an `ExpectError` step matches against a received `Error` signal.
///
/// Rust has no runtime `isinstance`-by-name, so `OfType` takes a
/// caller-supplied classifier closure rather than a type token — the
/// caller already knows how to distinguish their own error variants.
pub enum ErrorExpectation<E> {
    /// Matches any error.
    Any,
    /// Matches if the classifier returns `true` for the observed error.
    OfType(Box<dyn Fn(&E) -> bool + Send>),
    /// Matches if `error.to_string() == message`.
    Message(String),
    /// Matches if the predicate returns `true` for the observed error.
    Predicate(Box<dyn Fn(&E) -> bool + Send>),
    /// Runs the consumer against the observed error; an `Err(msg)` is
    /// recorded as a script failure with `msg` as the description.
    Consume(Box<dyn Fn(&E) -> Result<(), String> + Send>),
}

impl<E> ErrorExpectation<E> {
    /// Short name used in failure messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ErrorExpectation::Any => "Any",
            ErrorExpectation::OfType(_) => "OfType",
            ErrorExpectation::Message(_) => "Message",
            ErrorExpectation::Predicate(_) => "Predicate",
            ErrorExpectation::Consume(_) => "Consume",
        }
    }
}
