//! Retry progress threaded through every policy decision.

use std::fmt;
use std::time::Duration;

/// Progress of a single retry loop.
///
/// A status is created fresh for each loop and advanced by value through
/// [`RetryPolicy::apply`](crate::RetryPolicy::apply). It never outlives the loop
/// that produced it.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::RetryStatus;
/// use std::time::Duration;
///
/// let status = RetryStatus::new();
/// assert_eq!(status.iteration_number, 0);
/// assert_eq!(status.previous_delay, None);
///
/// let next = status.advance(Duration::from_micros(250));
/// assert_eq!(
///     next.to_string(),
///     "{ iteration_number: 1, cumulative_delay: 250us, previous_delay: 250us }"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryStatus {
    /// Number of retries already applied (0 before the first retry).
    pub iteration_number: u32,
    /// Sum of every delay applied so far.
    pub cumulative_delay: Duration,
    /// The most recently applied delay, absent before the first retry.
    pub previous_delay: Option<Duration>,
}

impl RetryStatus {
    /// The initial status of every retry loop.
    pub const fn new() -> Self {
        Self {
            iteration_number: 0,
            cumulative_delay: Duration::ZERO,
            previous_delay: None,
        }
    }

    /// The status after one more retry waiting `delay`.
    ///
    /// Counters saturate rather than wrap.
    #[must_use]
    pub fn advance(self, delay: Duration) -> Self {
        Self {
            iteration_number: self.iteration_number.saturating_add(1),
            cumulative_delay: self.cumulative_delay.saturating_add(delay),
            previous_delay: Some(delay),
        }
    }

    /// Returns true if no retry has been applied yet.
    pub fn is_initial(&self) -> bool {
        self.iteration_number == 0 && self.previous_delay.is_none()
    }

    pub(crate) fn fmt_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iteration_number: {}, cumulative_delay: {}us",
            self.iteration_number,
            self.cumulative_delay.as_micros()
        )?;

        match self.previous_delay {
            Some(delay) => write!(f, ", previous_delay: {}us", delay.as_micros()),
            None => write!(f, ", previous_delay: none"),
        }
    }
}

// Log/trace consumers parse this layout; keep field names and units stable.
impl fmt::Display for RetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        self.fmt_fields(f)?;
        write!(f, " }}")
    }
}
