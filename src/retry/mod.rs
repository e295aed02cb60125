//! Retry policies and the algebra for composing them.
//!
//! This module follows the "pure core, imperative shell" split:
//!
//! - **Pure Core**: a [`RetryPolicy`] maps a [`RetryStatus`] to `Some(delay)` or
//!   `None` (stop). [`RetryPolicy::apply`] and [`RetryPolicy::simulate`] never sleep.
//! - **Composable**: policies combine with [`combine`] (or `+`) and the wrapping
//!   combinators in [`policies`].
//! - **Imperative Shell**: [`RetryPolicy::apply_and_delay`] and
//!   [`RetryPolicy::retry`] are the only places that block the calling thread.
//!
//! # Quick Start
//!
//! ```rust
//! use retry_algebra::policies::{constant_delay, limit_retries};
//! use std::time::Duration;
//!
//! let policy = constant_delay(Duration::from_millis(1)) + limit_retries(3);
//!
//! let mut attempts = 0;
//! let result: Result<&str, &str> = policy.retry(
//!     |_status, result: &Result<&str, &str>| result.is_err(),
//!     |_status| {
//!         attempts += 1;
//!         if attempts < 3 { Err("transient") } else { Ok("done") }
//!     },
//! );
//!
//! assert_eq!(result, Ok("done"));
//! assert_eq!(attempts, 3);
//! ```
//!
//! # Catalog
//!
//! - **Limits**: [`never_retry`](policies::never_retry),
//!   [`limit_retries`](policies::limit_retries),
//!   [`limit_retries_by_delay`](policies::limit_retries_by_delay),
//!   [`limit_cumulative_delay`](policies::limit_cumulative_delay),
//!   [`limit_time_point`](policies::limit_time_point)
//! - **Delays**: [`constant_delay`](policies::constant_delay),
//!   [`exponential_backoff`](policies::exponential_backoff),
//!   [`cap_delay`](policies::cap_delay)
//! - **Jitter**: [`full_jitter`](policies::full_jitter),
//!   [`equal_jitter`](policies::equal_jitter),
//!   [`full_jitter_backoff`](policies::full_jitter_backoff),
//!   [`equal_jitter_backoff`](policies::equal_jitter_backoff),
//!   [`decorrelated_jitter_backoff`](policies::decorrelated_jitter_backoff)

pub mod policies;
mod policy;
mod random;
mod status;

pub use policy::{combine, RetryPolicy, Simulate};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use status::RetryStatus;
