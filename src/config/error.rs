//! Error types for policy configuration.

use std::fmt;

/// Error returned when a [`PolicyConfig`](super::PolicyConfig) cannot be built.
///
/// Configuration is validated once, at construction time; a built policy
/// never fails.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::{ConfigError, PolicyConfig};
///
/// let config = PolicyConfig::ConstantDelay { delay_us: -5 };
///
/// match config.build() {
///     Err(ConfigError::NegativeDuration { field, micros }) => {
///         assert_eq!(field, "delay_us");
///         assert_eq!(micros, -5);
///     }
///     other => panic!("Expected NegativeDuration, got {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration field was negative.
    NegativeDuration {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value, in microseconds.
        micros: i64,
    },
    /// A retry limit was negative.
    NegativeRetryLimit(i64),
    /// A retry limit does not fit the iteration counter.
    RetryLimitTooLarge(i64),
    /// A deadline, in microseconds since the Unix epoch, that the platform
    /// clock cannot represent.
    DeadlineOutOfRange(i64),
    /// A `combine` listed no policies.
    EmptyCombination,
}

impl ConfigError {
    /// Returns true if the error concerns a duration field.
    pub fn is_duration(&self) -> bool {
        matches!(self, Self::NegativeDuration { .. } | Self::DeadlineOutOfRange(_))
    }

    /// Returns true if the error concerns a retry limit.
    pub fn is_retry_limit(&self) -> bool {
        matches!(self, Self::NegativeRetryLimit(_) | Self::RetryLimitTooLarge(_))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeDuration { field, micros } => {
                write!(f, "{} must be a non-negative duration, got {}us", field, micros)
            }
            Self::NegativeRetryLimit(limit) => {
                write!(f, "retry limit must be non-negative, got {}", limit)
            }
            Self::RetryLimitTooLarge(limit) => {
                write!(f, "retry limit {} exceeds the maximum of {}", limit, u32::MAX)
            }
            Self::DeadlineOutOfRange(micros) => {
                write!(f, "deadline {}us after the Unix epoch is out of range", micros)
            }
            Self::EmptyCombination => write!(f, "combine requires at least one policy"),
        }
    }
}

impl std::error::Error for ConfigError {}
