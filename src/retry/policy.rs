//! The retry policy type and its algebra.

use std::fmt;
use std::iter::FusedIterator;
use std::ops::Add;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::policies;
use super::status::RetryStatus;

type Decision = dyn Fn(&RetryStatus) -> Option<Duration> + Send + Sync;

/// A composable retry policy.
///
/// A policy is a pure decision: given the progress so far it returns the delay
/// to wait before the next attempt, or `None` to stop retrying. Policies close
/// over fixed configuration only, so one value can drive any number of
/// concurrent retry loops. Cloning is cheap (the decision is reference counted).
///
/// Every policy carries a name, used for `Debug` output and log events.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::{RetryPolicy, RetryStatus};
/// use std::time::Duration;
///
/// // Linear backoff, built from scratch
/// let linear = RetryPolicy::new("linear(10ms)", |status: &RetryStatus| {
///     Some(Duration::from_millis(10) * (status.iteration_number + 1))
/// });
///
/// let delays: Vec<_> = linear
///     .simulate(3)
///     .map(|status| status.previous_delay.unwrap())
///     .collect();
///
/// assert_eq!(
///     delays,
///     vec![
///         Duration::from_millis(10),
///         Duration::from_millis(20),
///         Duration::from_millis(30),
///     ]
/// );
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    name: Arc<str>,
    decide: Arc<Decision>,
}

impl RetryPolicy {
    /// Create a policy from a decision function.
    pub fn new<F>(name: impl Into<Arc<str>>, decide: F) -> Self
    where
        F: Fn(&RetryStatus) -> Option<Duration> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decide: Arc::new(decide),
        }
    }

    /// The name used in `Debug` output and log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the policy without changing its behaviour.
    #[must_use]
    pub fn named(self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            decide: self.decide,
        }
    }

    /// Evaluate the decision for `status`.
    ///
    /// Returns `None` if no more retries should be attempted.
    pub fn delay(&self, status: &RetryStatus) -> Option<Duration> {
        (self.decide)(status)
    }

    /// Advance `status` by one retry without waiting.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_algebra::policies::{constant_delay, never_retry};
    /// use retry_algebra::RetryStatus;
    /// use std::time::Duration;
    ///
    /// let next = constant_delay(Duration::from_millis(5))
    ///     .apply(RetryStatus::new())
    ///     .unwrap();
    /// assert_eq!(next.iteration_number, 1);
    /// assert_eq!(next.previous_delay, Some(Duration::from_millis(5)));
    ///
    /// assert_eq!(never_retry().apply(RetryStatus::new()), None);
    /// ```
    pub fn apply(&self, status: RetryStatus) -> Option<RetryStatus> {
        let Some(delay) = self.delay(&status) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(policy = %self.name, %status, "retry policy stopped");
            return None;
        };

        let next = status.advance(delay);

        #[cfg(feature = "tracing")]
        tracing::trace!(policy = %self.name, status = %next, "retry policy applied");

        Some(next)
    }

    /// Advance `status` by one retry and block the calling thread for the
    /// chosen delay.
    pub fn apply_and_delay(&self, status: RetryStatus) -> Option<RetryStatus> {
        let next = self.apply(status)?;

        if let Some(delay) = next.previous_delay.filter(|d| !d.is_zero()) {
            std::thread::sleep(delay);
        }

        Some(next)
    }

    /// Run `action` until `should_retry` declines or the policy stops.
    ///
    /// Starting from a fresh status, `action` is invoked and its result handed
    /// to `should_retry`. When the predicate declines, the result is returned
    /// immediately. Otherwise the policy is applied (with a real wait); once it
    /// stops, the last result is returned as-is.
    ///
    /// A policy that never stops combined with a predicate that always accepts
    /// loops forever.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_algebra::policies::{limit_retries};
    ///
    /// let mut calls = 0;
    /// let result: Result<(), &str> = limit_retries(2).retry(
    ///     |_, result: &Result<(), &str>| result.is_err(),
    ///     |_| {
    ///         calls += 1;
    ///         Err("down")
    ///     },
    /// );
    ///
    /// assert_eq!(result, Err("down"));
    /// assert_eq!(calls, 3); // 1 initial + 2 retries
    /// ```
    pub fn retry<T, P, A>(&self, mut should_retry: P, mut action: A) -> T
    where
        P: FnMut(&RetryStatus, &T) -> bool,
        A: FnMut(&RetryStatus) -> T,
    {
        let mut status = RetryStatus::new();

        loop {
            let result = action(&status);

            if !should_retry(&status, &result) {
                return result;
            }

            match self.apply_and_delay(status) {
                Some(next) => status = next,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(policy = %self.name, %status, "retries exhausted");
                    return result;
                }
            }
        }
    }

    /// Async counterpart of [`RetryPolicy::retry`], waiting with
    /// `tokio::time::sleep` instead of blocking the thread.
    ///
    /// The action receives the status by value so the returned future does not
    /// borrow from the loop.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_algebra::policies::{constant_delay, limit_retries};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let policy = constant_delay(Duration::from_millis(1)) + limit_retries(5);
    ///
    /// let result = policy
    ///     .retry_async(
    ///         |_, result: &Result<u32, &str>| result.is_err(),
    ///         |status| async move {
    ///             if status.iteration_number < 2 { Err("busy") } else { Ok(status.iteration_number) }
    ///         },
    ///     )
    ///     .await;
    ///
    /// assert_eq!(result, Ok(2));
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn retry_async<T, P, A, Fut>(&self, mut should_retry: P, mut action: A) -> T
    where
        P: FnMut(&RetryStatus, &T) -> bool,
        A: FnMut(RetryStatus) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let mut status = RetryStatus::new();

        loop {
            let result = action(status).await;

            if !should_retry(&status, &result) {
                return result;
            }

            let Some(next) = self.apply(status) else {
                #[cfg(feature = "tracing")]
                tracing::debug!(policy = %self.name, %status, "retries exhausted");
                return result;
            };

            if let Some(delay) = next.previous_delay.filter(|d| !d.is_zero()) {
                tokio::time::sleep(delay).await;
            }

            status = next;
        }
    }

    /// Replay up to `n` steps from a fresh status without waiting.
    ///
    /// The returned iterator is lazy and ends early the first time the policy
    /// stops. Each call starts over.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_algebra::policies::constant_delay;
    /// use std::time::Duration;
    ///
    /// let cumulative: Vec<_> = constant_delay(Duration::from_micros(100))
    ///     .simulate(3)
    ///     .map(|status| status.cumulative_delay.as_micros())
    ///     .collect();
    ///
    /// assert_eq!(cumulative, vec![100, 200, 300]);
    /// ```
    pub fn simulate(&self, n: usize) -> Simulate<'_> {
        Simulate {
            policy: self,
            status: RetryStatus::new(),
            remaining: n,
        }
    }

    /// Method form of [`combine`].
    #[must_use]
    pub fn combine(self, other: RetryPolicy) -> Self {
        combine(self, other)
    }

    /// Stop after `n` retries, in addition to this policy's own rule.
    #[must_use]
    pub fn with_max_retries(self, n: u32) -> Self {
        combine(self, policies::limit_retries(n))
    }

    /// Never wait longer than `max`.
    #[must_use]
    pub fn with_max_delay(self, max: Duration) -> Self {
        policies::cap_delay(max, self)
    }

    /// Stop once a single delay reaches `limit`.
    #[must_use]
    pub fn with_delay_limit(self, limit: Duration) -> Self {
        policies::limit_retries_by_delay(limit, self)
    }

    /// Stop once the total time spent waiting would reach `limit`.
    #[must_use]
    pub fn with_cumulative_limit(self, limit: Duration) -> Self {
        policies::limit_cumulative_delay(limit, self)
    }

    /// Stop if the next wait would end after `deadline`.
    #[must_use]
    pub fn with_deadline(self, deadline: SystemTime) -> Self {
        policies::limit_time_point(deadline, self)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &&*self.name)
            .finish_non_exhaustive()
    }
}

/// Merge two independent constraints.
///
/// Both policies are evaluated on the same status. The combination stops if
/// either stops; otherwise it waits for the longer of the two delays. `x + y`
/// is shorthand for `combine(x, y)`.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::combine;
/// use retry_algebra::policies::{constant_delay, exponential_backoff, limit_retries};
/// use std::time::Duration;
///
/// let floor = constant_delay(Duration::from_millis(15));
/// let curve = exponential_backoff(Duration::from_millis(10));
/// let policy = combine(floor, curve) + limit_retries(3);
///
/// let delays: Vec<_> = policy
///     .simulate(10)
///     .map(|status| status.previous_delay.unwrap().as_millis())
///     .collect();
///
/// assert_eq!(delays, vec![15, 20, 40]);
/// ```
pub fn combine(x: RetryPolicy, y: RetryPolicy) -> RetryPolicy {
    let name = format!("combine({}, {})", x.name, y.name);

    RetryPolicy::new(name, move |status| {
        match (x.delay(status), y.delay(status)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        }
    })
}

impl Add for RetryPolicy {
    type Output = RetryPolicy;

    fn add(self, other: RetryPolicy) -> RetryPolicy {
        combine(self, other)
    }
}

/// Lazy replay of a policy, returned by [`RetryPolicy::simulate`].
#[derive(Debug, Clone)]
pub struct Simulate<'a> {
    policy: &'a RetryPolicy,
    status: RetryStatus,
    remaining: usize,
}

impl Iterator for Simulate<'_> {
    type Item = RetryStatus;

    fn next(&mut self) -> Option<RetryStatus> {
        if self.remaining == 0 {
            return None;
        }

        match self.policy.apply(self.status) {
            Some(next) => {
                self.remaining -= 1;
                self.status = next;
                Some(next)
            }
            None => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl FusedIterator for Simulate<'_> {}
