//! Testing utilities for retry policies.
//!
//! Jitter policies are only as testable as their random source. This module
//! provides deterministic [`RandomSource`] implementations plus assertion
//! macros for checking a policy's curve, and (with the `proptest` feature) an
//! `Arbitrary` implementation for [`RetryStatus`].
//!
//! # Examples
//!
//! ## Deterministic jitter
//!
//! ```rust
//! use retry_algebra::policies::equal_jitter_with;
//! use retry_algebra::testing::{FixedRandom, MaxRandom};
//! use retry_algebra::RetryStatus;
//! use std::time::Duration;
//!
//! let max = Duration::from_millis(100);
//! let low = equal_jitter_with(max, FixedRandom(0));
//! let high = equal_jitter_with(max, MaxRandom);
//!
//! assert_eq!(low.delay(&RetryStatus::new()), Some(Duration::from_millis(50)));
//! assert_eq!(high.delay(&RetryStatus::new()), Some(max));
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use retry_algebra::policies::{exponential_backoff, never_retry};
//! use retry_algebra::{assert_delays, assert_stops, RetryStatus};
//! use std::time::Duration;
//!
//! assert_stops!(never_retry(), RetryStatus::new());
//! assert_delays!(
//!     exponential_backoff(Duration::from_millis(1)),
//!     3,
//!     [1, 2, 4].map(Duration::from_millis)
//! );
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::retry::RandomSource;
#[cfg(feature = "proptest")]
use crate::retry::RetryStatus;

/// Always draws the same value, clamped to the requested bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRandom(pub u64);

impl RandomSource for FixedRandom {
    fn uniform(&self, upper: u64) -> u64 {
        self.0.min(upper)
    }
}

/// Always draws the upper bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxRandom;

impl RandomSource for MaxRandom {
    fn uniform(&self, upper: u64) -> u64 {
        upper
    }
}

/// Replays a fixed sequence of values, cycling when it runs out.
///
/// Clones share the same cursor, so a test can keep a handle and inspect how
/// many values a policy consumed.
///
/// # Example
///
/// ```rust
/// use retry_algebra::testing::SequenceRandom;
/// use retry_algebra::RandomSource;
///
/// let source = SequenceRandom::new([3, 5]);
/// let handle = source.clone();
///
/// assert_eq!(source.uniform(10), 3);
/// assert_eq!(source.uniform(10), 5);
/// assert_eq!(source.uniform(4), 3);
/// assert_eq!(handle.draws(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Arc<[u64]>,
    cursor: Arc<AtomicUsize>,
}

impl SequenceRandom {
    /// Create a source replaying `values`. An empty sequence always draws zero.
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl RandomSource for SequenceRandom {
    fn uniform(&self, upper: u64) -> u64 {
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.values.is_empty() {
            return 0;
        }
        self.values[n % self.values.len()].min(upper)
    }
}

/// Assert that a policy stops for the given status.
///
/// # Example
///
/// ```rust
/// use retry_algebra::policies::limit_retries;
/// use retry_algebra::{assert_stops, RetryStatus};
///
/// assert_stops!(limit_retries(0), RetryStatus::new());
/// ```
#[macro_export]
macro_rules! assert_stops {
    ($policy:expr, $status:expr) => {
        match $policy.delay(&$status) {
            None => {}
            Some(delay) => {
                panic!("Expected policy to stop, got delay {:?}", delay);
            }
        }
    };
}

/// Assert the exact delays produced by simulating `n` steps of a policy.
///
/// The expectation is anything iterable over `Duration`; the simulation must
/// produce exactly as many delays (stopping early counts).
///
/// # Example
///
/// ```rust
/// use retry_algebra::policies::{constant_delay, limit_retries};
/// use retry_algebra::assert_delays;
/// use std::time::Duration;
///
/// let policy = constant_delay(Duration::from_millis(2)) + limit_retries(2);
/// assert_delays!(policy, 5, [Duration::from_millis(2); 2]);
/// ```
#[macro_export]
macro_rules! assert_delays {
    ($policy:expr, $n:expr, $expected:expr) => {{
        let policy = &$policy;
        let actual: ::std::vec::Vec<::std::time::Duration> = policy
            .simulate($n)
            .filter_map(|status| status.previous_delay)
            .collect();
        let expected: ::std::vec::Vec<::std::time::Duration> =
            ::std::iter::IntoIterator::into_iter($expected).collect();
        assert_eq!(actual, expected, "unexpected delays from {:?}", policy);
    }};
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl Arbitrary for RetryStatus {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // Keep counters far from saturation so tests can keep advancing.
        (0u32..10_000, 0u64..1 << 40, proptest::option::of(0u64..1 << 32))
            .prop_map(|(iteration_number, cumulative, previous)| RetryStatus {
                iteration_number,
                cumulative_delay: std::time::Duration::from_micros(cumulative),
                previous_delay: previous.map(std::time::Duration::from_micros),
            })
            .boxed()
    }
}
