//! Declarative policy configuration.
//!
//! A [`PolicyConfig`] describes a policy tree as plain data, so retry
//! behaviour can live in a config file rather than in code. Durations are
//! signed microseconds: malformed values stay representable and are rejected
//! by [`PolicyConfig::build`] with a [`ConfigError`] instead of producing a
//! surprising curve at runtime.
//!
//! With the `serde` feature, both config types (de)serialize as internally
//! tagged objects:
//!
//! ```json
//! {
//!   "kind": "cap_delay",
//!   "max_delay_us": 1000000,
//!   "policy": { "kind": "full_jitter_backoff", "base_us": 10 }
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use retry_algebra::PolicyConfig;
//! use std::time::Duration;
//!
//! let config = PolicyConfig::Combine {
//!     policies: vec![
//!         PolicyConfig::CapDelay {
//!             max_delay_us: 40,
//!             policy: Box::new(PolicyConfig::ExponentialBackoff { base_us: 10 }),
//!         },
//!         PolicyConfig::LimitRetries { limit: 4 },
//!     ],
//! };
//!
//! let policy = config.build().unwrap();
//! let delays: Vec<_> = policy
//!     .simulate(10)
//!     .map(|s| s.previous_delay.unwrap().as_micros())
//!     .collect();
//!
//! assert_eq!(delays, vec![10, 20, 40, 40]);
//! ```

mod error;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::preemptible::PreemptibleRetry;
use crate::retry::policies::*;
use crate::retry::{combine, RandomSource, RetryPolicy, ThreadRandom};

pub use error::ConfigError;

/// A policy tree mirroring the catalog in [`crate::policies`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PolicyConfig {
    /// [`never_retry`]
    NeverRetry,
    /// [`limit_retries`]
    LimitRetries {
        /// Maximum number of retries.
        limit: i64,
    },
    /// [`constant_delay`]
    ConstantDelay {
        /// Delay between attempts.
        delay_us: i64,
    },
    /// [`full_jitter`]
    FullJitter {
        /// Upper bound of the uniform delay.
        max_delay_us: i64,
    },
    /// [`equal_jitter`]
    EqualJitter {
        /// Upper bound of the delay.
        max_delay_us: i64,
    },
    /// [`exponential_backoff`]
    ExponentialBackoff {
        /// First delay; doubled every retry.
        base_us: i64,
    },
    /// [`full_jitter_backoff`]
    FullJitterBackoff {
        /// First upper bound; doubled every retry.
        base_us: i64,
    },
    /// [`equal_jitter_backoff`]
    EqualJitterBackoff {
        /// First upper bound; doubled every retry.
        base_us: i64,
    },
    /// [`decorrelated_jitter_backoff`]
    DecorrelatedJitterBackoff {
        /// Label only; see the policy's precondition.
        base_us: i64,
    },
    /// [`cap_delay`]
    CapDelay {
        /// Largest delay ever returned.
        max_delay_us: i64,
        /// The wrapped policy.
        policy: Box<PolicyConfig>,
    },
    /// [`limit_retries_by_delay`]
    LimitRetriesByDelay {
        /// Stop once a single delay reaches this.
        delay_limit_us: i64,
        /// The wrapped policy.
        policy: Box<PolicyConfig>,
    },
    /// [`limit_cumulative_delay`]
    LimitCumulativeDelay {
        /// Stop once the total delay would reach this.
        cumulative_limit_us: i64,
        /// The wrapped policy.
        policy: Box<PolicyConfig>,
    },
    /// [`limit_time_point`]
    LimitTimePoint {
        /// Deadline as microseconds since the Unix epoch.
        deadline_unix_us: i64,
        /// The wrapped policy.
        policy: Box<PolicyConfig>,
    },
    /// [`combine`] folded over every entry.
    Combine {
        /// At least one policy.
        policies: Vec<PolicyConfig>,
    },
}

impl PolicyConfig {
    /// Validate and build the policy, drawing jitter from [`ThreadRandom`].
    pub fn build(&self) -> Result<RetryPolicy, ConfigError> {
        self.build_with(Arc::new(ThreadRandom))
    }

    /// Validate and build the policy, drawing jitter from `source`.
    ///
    /// Every jitter policy in the tree shares the one source.
    pub fn build_with(&self, source: Arc<dyn RandomSource>) -> Result<RetryPolicy, ConfigError> {
        let policy = match self {
            Self::NeverRetry => never_retry(),
            Self::LimitRetries { limit } => limit_retries(retry_limit(*limit)?),
            Self::ConstantDelay { delay_us } => constant_delay(micros("delay_us", *delay_us)?),
            Self::FullJitter { max_delay_us } => {
                full_jitter_with(micros("max_delay_us", *max_delay_us)?, source)
            }
            Self::EqualJitter { max_delay_us } => {
                equal_jitter_with(micros("max_delay_us", *max_delay_us)?, source)
            }
            Self::ExponentialBackoff { base_us } => {
                exponential_backoff(micros("base_us", *base_us)?)
            }
            Self::FullJitterBackoff { base_us } => {
                full_jitter_backoff_with(micros("base_us", *base_us)?, source)
            }
            Self::EqualJitterBackoff { base_us } => {
                equal_jitter_backoff_with(micros("base_us", *base_us)?, source)
            }
            Self::DecorrelatedJitterBackoff { base_us } => {
                decorrelated_jitter_backoff_with(micros("base_us", *base_us)?, source)
            }
            Self::CapDelay {
                max_delay_us,
                policy,
            } => cap_delay(
                micros("max_delay_us", *max_delay_us)?,
                policy.build_with(source)?,
            ),
            Self::LimitRetriesByDelay {
                delay_limit_us,
                policy,
            } => limit_retries_by_delay(
                micros("delay_limit_us", *delay_limit_us)?,
                policy.build_with(source)?,
            ),
            Self::LimitCumulativeDelay {
                cumulative_limit_us,
                policy,
            } => limit_cumulative_delay(
                micros("cumulative_limit_us", *cumulative_limit_us)?,
                policy.build_with(source)?,
            ),
            Self::LimitTimePoint {
                deadline_unix_us,
                policy,
            } => {
                limit_time_point(deadline(*deadline_unix_us)?, policy.build_with(source)?)
            }
            Self::Combine { policies } => {
                let mut built = policies
                    .iter()
                    .map(|config| config.build_with(Arc::clone(&source)));
                let first = built.next().ok_or(ConfigError::EmptyCombination)??;
                built.try_fold(first, |acc, next| next.map(|policy| combine(acc, policy)))?
            }
        };

        Ok(policy)
    }
}

/// Configuration for a [`PreemptibleRetry`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreemptibleConfig {
    /// Policy while waiting for the condition.
    pub before: PolicyConfig,
    /// Policy once the condition has been observed.
    pub after: PolicyConfig,
}

impl PreemptibleConfig {
    /// Validate and build both policies, drawing jitter from [`ThreadRandom`].
    pub fn build(&self) -> Result<PreemptibleRetry, ConfigError> {
        self.build_with(Arc::new(ThreadRandom))
    }

    /// Validate and build both policies, drawing jitter from `source`.
    pub fn build_with(&self, source: Arc<dyn RandomSource>) -> Result<PreemptibleRetry, ConfigError> {
        Ok(PreemptibleRetry::new(
            self.before.build_with(Arc::clone(&source))?,
            self.after.build_with(source)?,
        ))
    }
}

fn micros(field: &'static str, micros: i64) -> Result<Duration, ConfigError> {
    u64::try_from(micros)
        .map(Duration::from_micros)
        .map_err(|_| ConfigError::NegativeDuration { field, micros })
}

fn deadline(unix_us: i64) -> Result<SystemTime, ConfigError> {
    let since_epoch = micros("deadline_unix_us", unix_us)?;
    SystemTime::UNIX_EPOCH
        .checked_add(since_epoch)
        .ok_or(ConfigError::DeadlineOutOfRange(unix_us))
}

fn retry_limit(limit: i64) -> Result<u32, ConfigError> {
    if limit < 0 {
        return Err(ConfigError::NegativeRetryLimit(limit));
    }
    u32::try_from(limit).map_err(|_| ConfigError::RetryLimitTooLarge(limit))
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::testing::{FixedRandom, MaxRandom};
    use crate::RetryStatus;

    fn delays(policy: &RetryPolicy, n: usize) -> Vec<u128> {
        policy
            .simulate(n)
            .map(|s| s.previous_delay.unwrap().as_micros())
            .collect()
    }

    #[test]
    fn test_build_limit_retries() {
        let policy = PolicyConfig::LimitRetries { limit: 3 }.build().unwrap();
        assert_eq!(delays(&policy, 10), vec![0, 0, 0]);
        assert_eq!(policy.name(), "limit_retries(3)");
    }

    #[test]
    fn test_build_never_retry() {
        let policy = PolicyConfig::NeverRetry.build().unwrap();
        assert_eq!(policy.simulate(3).count(), 0);
    }

    #[test]
    fn test_build_wrappers() {
        let config = PolicyConfig::LimitCumulativeDelay {
            cumulative_limit_us: 250,
            policy: Box::new(PolicyConfig::ConstantDelay { delay_us: 100 }),
        };
        assert_eq!(delays(&config.build().unwrap(), 10), vec![100, 100]);

        let config = PolicyConfig::LimitRetriesByDelay {
            delay_limit_us: 40,
            policy: Box::new(PolicyConfig::ExponentialBackoff { base_us: 10 }),
        };
        assert_eq!(delays(&config.build().unwrap(), 10), vec![10, 20]);
    }

    #[test]
    fn test_build_time_point_in_past_stops() {
        let config = PolicyConfig::LimitTimePoint {
            deadline_unix_us: 0,
            policy: Box::new(PolicyConfig::ConstantDelay { delay_us: 1 }),
        };
        assert_eq!(config.build().unwrap().delay(&RetryStatus::new()), None);
    }

    #[test]
    fn test_build_with_injected_source() {
        let config = PolicyConfig::Combine {
            policies: vec![
                PolicyConfig::FullJitter { max_delay_us: 100 },
                PolicyConfig::EqualJitterBackoff { base_us: 10 },
                PolicyConfig::LimitRetries { limit: 2 },
            ],
        };

        let low = config.build_with(Arc::new(FixedRandom(0))).unwrap();
        assert_eq!(delays(&low, 5), vec![5, 10]);

        let high = config.build_with(Arc::new(MaxRandom)).unwrap();
        assert_eq!(delays(&high, 5), vec![100, 100]);
    }

    #[test]
    fn test_build_decorrelated_keeps_precondition() {
        let policy = PolicyConfig::DecorrelatedJitterBackoff { base_us: 10 }
            .build()
            .unwrap();
        assert_eq!(policy.delay(&RetryStatus::new()), None);
    }

    #[test]
    fn test_rejects_negative_durations() {
        let config = PolicyConfig::CapDelay {
            max_delay_us: 1_000,
            policy: Box::new(PolicyConfig::FullJitterBackoff { base_us: -1 }),
        };

        assert_eq!(
            config.build().unwrap_err(),
            ConfigError::NegativeDuration {
                field: "base_us",
                micros: -1
            }
        );
    }

    #[test]
    fn test_rejects_negative_deadline() {
        let config = PolicyConfig::LimitTimePoint {
            deadline_unix_us: -1,
            policy: Box::new(PolicyConfig::NeverRetry),
        };
        assert!(config.build().unwrap_err().is_duration());
    }

    #[test]
    fn test_far_deadline_never_panics() {
        let config = PolicyConfig::LimitTimePoint {
            deadline_unix_us: i64::MAX,
            policy: Box::new(PolicyConfig::ConstantDelay { delay_us: 1 }),
        };

        // Representable on some platforms, out of range on others.
        match config.build() {
            Ok(policy) => assert_eq!(
                policy.delay(&RetryStatus::new()),
                Some(Duration::from_micros(1))
            ),
            Err(err) => assert_eq!(err, ConfigError::DeadlineOutOfRange(i64::MAX)),
        }
    }

    #[test]
    fn test_deadline_matches_checked_epoch_offset() {
        let expected = SystemTime::UNIX_EPOCH.checked_add(Duration::from_micros(i64::MAX as u64));
        assert_eq!(deadline(i64::MAX).ok(), expected);
        assert_eq!(
            deadline(1_500_000),
            Ok(SystemTime::UNIX_EPOCH + Duration::from_millis(1_500))
        );
    }

    #[test]
    fn test_rejects_bad_retry_limits() {
        assert_eq!(
            PolicyConfig::LimitRetries { limit: -3 }.build().unwrap_err(),
            ConfigError::NegativeRetryLimit(-3)
        );
        assert_eq!(
            PolicyConfig::LimitRetries { limit: 1 << 33 }
                .build()
                .unwrap_err(),
            ConfigError::RetryLimitTooLarge(1 << 33)
        );
    }

    #[test]
    fn test_rejects_empty_combination() {
        assert_eq!(
            PolicyConfig::Combine { policies: vec![] }.build().unwrap_err(),
            ConfigError::EmptyCombination
        );
    }

    #[test]
    fn test_combination_reports_nested_error() {
        let config = PolicyConfig::Combine {
            policies: vec![
                PolicyConfig::NeverRetry,
                PolicyConfig::EqualJitter { max_delay_us: -7 },
            ],
        };
        assert_eq!(
            config.build().unwrap_err(),
            ConfigError::NegativeDuration {
                field: "max_delay_us",
                micros: -7
            }
        );
    }

    #[test]
    fn test_build_preemptible() {
        let config = PreemptibleConfig {
            before: PolicyConfig::ConstantDelay { delay_us: 100 },
            after: PolicyConfig::Combine {
                policies: vec![
                    PolicyConfig::ExponentialBackoff { base_us: 1 },
                    PolicyConfig::LimitRetries { limit: 2 },
                ],
            },
        };

        let policy = config.build().unwrap();
        let steps: Vec<_> = policy
            .simulate(1, 5)
            .map(|s| (s.condition_signalled, s.previous_delay.unwrap().as_micros()))
            .collect();
        assert_eq!(steps, vec![(false, 100), (true, 1), (true, 2)]);
    }

    #[test]
    fn test_preemptible_rejects_bad_after() {
        let config = PreemptibleConfig {
            before: PolicyConfig::NeverRetry,
            after: PolicyConfig::LimitRetries { limit: -1 },
        };
        assert!(config.build().unwrap_err().is_retry_limit());
    }
}
