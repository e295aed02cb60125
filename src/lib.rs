//! # retry_algebra
//!
//! > *Decide purely, wait imperatively.*
//!
//! A Rust library for building retry behaviour out of small, composable policies.
//!
//! ## Philosophy
//!
//! A [`RetryPolicy`] is a pure function from retry progress ([`RetryStatus`]) to
//! either a delay or a stop signal. Everything else is algebra on top of that:
//! - **Primitives**: constant delays, exponential backoff, jitter variants
//! - **Combinators**: capping, delay/time/iteration limits, max-of-two
//! - **Shell**: a blocking [`RetryPolicy::retry`] loop, and a
//!   [`PreemptibleRetry`] that can be woken early by an external condition
//!
//! ## Quick Example
//!
//! ```rust
//! use retry_algebra::policies::{cap_delay, exponential_backoff, limit_retries};
//! use std::time::Duration;
//!
//! // 10ms, 20ms, 40ms, ... never more than 50ms, at most 5 retries
//! let policy = cap_delay(
//!     Duration::from_millis(50),
//!     exponential_backoff(Duration::from_millis(10)),
//! ) + limit_retries(5);
//!
//! let delays: Vec<_> = policy
//!     .simulate(10)
//!     .filter_map(|status| status.previous_delay)
//!     .collect();
//!
//! assert_eq!(delays.len(), 5);
//! assert_eq!(delays[3], Duration::from_millis(50));
//! ```
//!
//! ## Cargo features
//!
//! - `tracing`: emit `tracing` events for applied steps, stops and preemptions
//! - `serde`: (de)serialize [`RetryStatus`] and the [`config`] types
//! - `async`: [`RetryPolicy::retry_async`] driven by `tokio::time::sleep`
//! - `proptest`: `Arbitrary` for [`RetryStatus`] in [`testing`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod preemptible;
pub mod retry;
pub mod testing;

// Re-exports
pub use config::{ConfigError, PolicyConfig, PreemptibleConfig};
pub use preemptible::{
    Phase, Preemption, PreemptibleRetry, PreemptibleRetryStatus, WaitOutcome,
};
pub use retry::policies;
pub use retry::{combine, RandomSource, RetryPolicy, RetryStatus, SeededRandom, ThreadRandom};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PolicyConfig, PreemptibleConfig};
    pub use crate::preemptible::{Preemption, PreemptibleRetry, PreemptibleRetryStatus};
    pub use crate::retry::policies::*;
    pub use crate::retry::{combine, RetryPolicy, RetryStatus};
}
