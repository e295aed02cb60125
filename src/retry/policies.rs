//! The policy catalog.
//!
//! Every entry is an ordinary [`RetryPolicy`]; nothing here has access to
//! anything but the status and its own configuration. Jitter entries come in
//! two flavours: the plain constructor draws from [`ThreadRandom`], and the
//! `*_with` constructor takes any [`RandomSource`].
//!
//! Most backoff curves here are unlimited. Pair them with a limit:
//!
//! ```rust
//! use retry_algebra::policies::{cap_delay, full_jitter_backoff, limit_cumulative_delay};
//! use std::time::Duration;
//!
//! let policy = limit_cumulative_delay(
//!     Duration::from_secs(30),
//!     cap_delay(Duration::from_secs(1), full_jitter_backoff(Duration::from_micros(10))),
//! );
//! # let _ = policy;
//! ```
//!
//! See <http://www.awsarchitectureblog.com/2015/03/backoff.html> for the
//! jitter variants.

use std::time::{Duration, SystemTime};

use super::policy::RetryPolicy;
use super::random::{RandomSource, ThreadRandom};

/// Never retry.
pub fn never_retry() -> RetryPolicy {
    RetryPolicy::new("never_retry", |_| None)
}

/// Retry immediately, but only up to `retry_limit` times.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::policies::limit_retries;
/// use std::time::Duration;
///
/// let statuses: Vec<_> = limit_retries(2).simulate(10).collect();
/// assert_eq!(statuses.len(), 2);
/// assert!(statuses.iter().all(|s| s.previous_delay == Some(Duration::ZERO)));
/// ```
pub fn limit_retries(retry_limit: u32) -> RetryPolicy {
    RetryPolicy::new(format!("limit_retries({retry_limit})"), move |status| {
        if status.iteration_number >= retry_limit {
            return None;
        }
        Some(Duration::ZERO)
    })
}

/// Constant delay with unlimited retries.
pub fn constant_delay(delay: Duration) -> RetryPolicy {
    RetryPolicy::new(format!("constant_delay({delay:?})"), move |_| Some(delay))
}

/// Full jitter delay with unlimited retries: uniform over `[0, max_delay]`.
pub fn full_jitter(max_delay: Duration) -> RetryPolicy {
    full_jitter_with(max_delay, ThreadRandom)
}

/// [`full_jitter`] drawing from `source`.
pub fn full_jitter_with<R>(max_delay: Duration, source: R) -> RetryPolicy
where
    R: RandomSource + 'static,
{
    RetryPolicy::new(format!("full_jitter({max_delay:?})"), move |_| {
        Some(uniform_delay(&source, max_delay))
    })
}

/// Equal jitter delay with unlimited retries: `max/2 + uniform[0, max/2]`.
///
/// The half is taken in whole microseconds, so `equal_jitter(101us)` stays
/// within `[50us, 100us]`.
pub fn equal_jitter(max_delay: Duration) -> RetryPolicy {
    equal_jitter_with(max_delay, ThreadRandom)
}

/// [`equal_jitter`] drawing from `source`.
pub fn equal_jitter_with<R>(max_delay: Duration, source: R) -> RetryPolicy
where
    R: RandomSource + 'static,
{
    RetryPolicy::new(format!("equal_jitter({max_delay:?})"), move |_| {
        let half = half_micros(max_delay);
        Some(half.saturating_add(uniform_delay(&source, half)))
    })
}

/// Grow the delay exponentially: `base * 2^iteration_number`.
///
/// Saturates at [`Duration::MAX`]; combine with [`cap_delay`] for a
/// practical ceiling.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::policies::exponential_backoff;
/// use std::time::Duration;
///
/// let delays: Vec<_> = exponential_backoff(Duration::from_millis(100))
///     .simulate(4)
///     .map(|s| s.previous_delay.unwrap().as_millis())
///     .collect();
///
/// assert_eq!(delays, vec![100, 200, 400, 800]);
/// ```
pub fn exponential_backoff(base: Duration) -> RetryPolicy {
    RetryPolicy::new(format!("exponential_backoff({base:?})"), move |status| {
        Some(backoff(base, status.iteration_number))
    })
}

/// Full jitter exponential backoff: uniform over `[0, base * 2^i]`.
///
/// This is the uncapped curve. Typically you would bound it:
///
/// ```rust
/// use retry_algebra::policies::{cap_delay, full_jitter_backoff};
/// use std::time::Duration;
///
/// let policy = cap_delay(Duration::from_millis(1000), full_jitter_backoff(Duration::from_micros(10)));
/// # let _ = policy;
/// ```
pub fn full_jitter_backoff(base: Duration) -> RetryPolicy {
    full_jitter_backoff_with(base, ThreadRandom)
}

/// [`full_jitter_backoff`] drawing from `source`.
pub fn full_jitter_backoff_with<R>(base: Duration, source: R) -> RetryPolicy
where
    R: RandomSource + 'static,
{
    RetryPolicy::new(format!("full_jitter_backoff({base:?})"), move |status| {
        Some(uniform_delay(&source, backoff(base, status.iteration_number)))
    })
}

/// Equal jitter exponential backoff: `h + uniform[0, h]` with
/// `h = base * 2^i / 2`.
///
/// This is the uncapped curve; bound it with [`cap_delay`].
pub fn equal_jitter_backoff(base: Duration) -> RetryPolicy {
    equal_jitter_backoff_with(base, ThreadRandom)
}

/// [`equal_jitter_backoff`] drawing from `source`.
pub fn equal_jitter_backoff_with<R>(base: Duration, source: R) -> RetryPolicy
where
    R: RandomSource + 'static,
{
    RetryPolicy::new(format!("equal_jitter_backoff({base:?})"), move |status| {
        let half = half_micros(backoff(base, status.iteration_number));
        Some(half.saturating_add(uniform_delay(&source, half)))
    })
}

/// Decorrelated jitter backoff: uniform over `[0, 3 * previous_delay]`.
///
/// # Precondition
///
/// The delay is derived only from `previous_delay`, so this policy stops on a
/// fresh status. It is meant to run after a policy that supplies the first
/// delay, for instance through [`PreemptibleRetry`](crate::PreemptibleRetry)
/// or a hand-built status. `base` only labels the policy.
///
/// ```rust
/// use retry_algebra::policies::decorrelated_jitter_backoff;
/// use retry_algebra::RetryStatus;
/// use std::time::Duration;
///
/// let policy = decorrelated_jitter_backoff(Duration::from_millis(10));
/// assert_eq!(policy.delay(&RetryStatus::new()), None);
///
/// let seeded = RetryStatus::new().advance(Duration::from_millis(10));
/// assert!(policy.delay(&seeded).unwrap() <= Duration::from_millis(30));
/// ```
pub fn decorrelated_jitter_backoff(base: Duration) -> RetryPolicy {
    decorrelated_jitter_backoff_with(base, ThreadRandom)
}

/// [`decorrelated_jitter_backoff`] drawing from `source`.
pub fn decorrelated_jitter_backoff_with<R>(base: Duration, source: R) -> RetryPolicy
where
    R: RandomSource + 'static,
{
    RetryPolicy::new(
        format!("decorrelated_jitter_backoff({base:?})"),
        move |status| {
            let previous = status.previous_delay?;
            let upper = micros(previous).saturating_mul(3);
            Some(Duration::from_micros(source.uniform(upper)))
        },
    )
}

/// Set an upper bound on the delay of `policy`.
///
/// `cap_delay(1000us, exponential_backoff(10us))` never sleeps for longer
/// than 1000us.
pub fn cap_delay(max_delay: Duration, policy: RetryPolicy) -> RetryPolicy {
    let name = format!("cap_delay({max_delay:?}, {})", policy.name());
    RetryPolicy::new(name, move |status| {
        policy.delay(status).map(|delay| delay.min(max_delay))
    })
}

/// Stop once a single delay of `policy` reaches or exceeds `delay_limit`.
pub fn limit_retries_by_delay(delay_limit: Duration, policy: RetryPolicy) -> RetryPolicy {
    let name = format!("limit_retries_by_delay({delay_limit:?}, {})", policy.name());
    RetryPolicy::new(name, move |status| {
        policy.delay(status).filter(|delay| *delay < delay_limit)
    })
}

/// Limit the total time spent waiting.
///
/// Stops when the next delay would bring the cumulative delay to
/// `cumulative_limit` or beyond.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::policies::{constant_delay, limit_cumulative_delay};
/// use std::time::Duration;
///
/// let policy = limit_cumulative_delay(
///     Duration::from_micros(250),
///     constant_delay(Duration::from_micros(100)),
/// );
/// assert_eq!(policy.simulate(10).count(), 2);
/// ```
pub fn limit_cumulative_delay(cumulative_limit: Duration, policy: RetryPolicy) -> RetryPolicy {
    let name = format!("limit_cumulative_delay({cumulative_limit:?}, {})", policy.name());
    RetryPolicy::new(name, move |status| {
        policy
            .delay(status)
            .filter(|delay| delay.saturating_add(status.cumulative_delay) < cumulative_limit)
    })
}

/// Stop retrying once the next wait would end after `deadline`,
/// e.g. don't retry after 07:02:00 today.
pub fn limit_time_point(deadline: SystemTime, policy: RetryPolicy) -> RetryPolicy {
    limit_time_point_with(deadline, policy, SystemTime::now)
}

/// [`limit_time_point`] reading the wall clock from `now`.
pub fn limit_time_point_with<C>(deadline: SystemTime, policy: RetryPolicy, now: C) -> RetryPolicy
where
    C: Fn() -> SystemTime + Send + Sync + 'static,
{
    let name = format!("limit_time_point({deadline:?}, {})", policy.name());
    RetryPolicy::new(name, move |status| {
        let delay = policy.delay(status)?;
        match now().checked_add(delay) {
            Some(wake) if wake <= deadline => Some(delay),
            _ => None,
        }
    })
}

fn backoff(base: Duration, iteration: u32) -> Duration {
    let nanos = base.as_nanos();
    if nanos == 0 {
        return Duration::ZERO;
    }
    // The shift must not push set bits out of the u128.
    if iteration > nanos.leading_zeros() {
        return Duration::MAX;
    }
    from_nanos_saturating(nanos << iteration)
}

fn from_nanos_saturating(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}

fn half_micros(delay: Duration) -> Duration {
    Duration::from_micros(micros(delay) / 2)
}

fn micros(delay: Duration) -> u64 {
    u64::try_from(delay.as_micros()).unwrap_or(u64::MAX)
}

fn uniform_delay(source: &dyn RandomSource, upper: Duration) -> Duration {
    Duration::from_micros(source.uniform(micros(upper)))
}
