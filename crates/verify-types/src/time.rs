use std::time::Duration;

/// A point on the virtual clock.
///
/// Starts at an epoch of zero and only ever advances by explicit
/// `advance_to`/`advance_by` calls — it never tracks wall-clock time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualInstant(Duration);

impl VirtualInstant {
    pub const EPOCH: VirtualInstant = VirtualInstant(Duration::ZERO);

    pub fn from_duration_since_epoch(d: Duration) -> Self {
        Self(d)
    }

    pub fn duration_since_epoch(&self) -> Duration {
        self.0
    }

    /// Saturating addition; virtual time never needs to represent
    /// durations past `Duration::MAX`.
    pub fn checked_add(&self, d: Duration) -> Option<Self> {
        self.0.checked_add(d).map(Self)
    }
}

impl std::fmt::Display for VirtualInstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t+{:?}", self.0)
    }
}

impl std::ops::Add<Duration> for VirtualInstant {
    type Output = VirtualInstant;

    fn add(self, rhs: Duration) -> VirtualInstant {
        VirtualInstant(self.0 + rhs)
    }
}
