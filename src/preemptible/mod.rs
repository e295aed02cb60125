//! Retry loops whose waits can be cut short by an external condition.
//!
//! A [`PreemptibleRetry`] switches from one [`RetryPolicy`] to another when a
//! condition becomes true. While the first ("before") policy governs, each
//! wait can be preempted by the condition so the action is re-attempted
//! immediately. Once the condition has been seen, the second ("after") policy
//! takes over from a fresh status and keeps governing until the loop ends.
//!
//! # Shared state
//!
//! The caller owns a `Condvar`, a `Mutex` around their state, and a predicate
//! over that state. The state must only be modified while holding the mutex,
//! after which every waiter is notified (see [`signal`]):
//!
//! ```rust
//! use retry_algebra::policies::{constant_delay, limit_retries};
//! use retry_algebra::preemptible::{signal, PreemptibleRetry};
//! use std::sync::{Condvar, Mutex};
//! use std::time::Duration;
//!
//! let condvar = Condvar::new();
//! let connected = Mutex::new(false);
//!
//! // Poll slowly until told the peer is up, then retry quickly a few times.
//! let policy = PreemptibleRetry::new(
//!     constant_delay(Duration::from_secs(60)),
//!     constant_delay(Duration::from_millis(1)) + limit_retries(3),
//! );
//!
//! std::thread::scope(|scope| {
//!     scope.spawn(|| signal(&condvar, &connected, |up| *up = true));
//!
//!     let result: Result<(), &str> = policy.retry(
//!         &condvar,
//!         &connected,
//!         |up: &bool| *up,
//!         |_, result: &Result<(), &str>| result.is_err(),
//!         |_| Err("peer unreachable"),
//!     );
//!     assert_eq!(result, Err("peer unreachable"));
//! });
//! ```

mod wait;

use std::fmt;
use std::ops::Deref;
use std::sync::{Condvar, Mutex};

use crate::retry::{RetryPolicy, RetryStatus};

pub use wait::{signal, Preemption, WaitOutcome};

/// Which policy governs a [`PreemptibleRetry`] loop.
///
/// The only transition is `Before -> After`, taken the first time the
/// condition is observed true, and it always resets the retry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// The condition has not been observed; waits are preemptible.
    #[default]
    Before,
    /// The condition has been observed; terminal.
    After,
}

/// A [`RetryStatus`] plus whether the condition cut the last wait short.
///
/// Dereferences to the embedded [`RetryStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreemptibleRetryStatus {
    /// Progress within the current phase.
    pub status: RetryStatus,
    /// True exactly when the condition became true during the wait that
    /// produced this status.
    pub condition_signalled: bool,
    /// The phase this status belongs to.
    pub phase: Phase,
}

impl PreemptibleRetryStatus {
    /// The initial status of every preemptible loop.
    pub const fn new() -> Self {
        Self {
            status: RetryStatus::new(),
            condition_signalled: false,
            phase: Phase::Before,
        }
    }

    fn before(status: RetryStatus, condition_signalled: bool) -> Self {
        Self {
            status,
            condition_signalled,
            phase: Phase::Before,
        }
    }

    fn after(status: RetryStatus, condition_signalled: bool) -> Self {
        Self {
            status,
            condition_signalled,
            phase: Phase::After,
        }
    }
}

impl Deref for PreemptibleRetryStatus {
    type Target = RetryStatus;

    fn deref(&self) -> &RetryStatus {
        &self.status
    }
}

impl fmt::Display for PreemptibleRetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        self.status.fmt_fields(f)?;
        write!(f, ", condition_signalled: {} }}", self.condition_signalled)
    }
}

/// Switch from one [`RetryPolicy`] to another when a condition becomes true.
///
/// Iteration counters never carry over from the "before" phase into the
/// "after" phase; they are independent retry budgets. If a connection was
/// retried 1000 times before the peer came up, the subsequent exponential
/// backoff still starts at `base`, not `base * 2^1000`.
#[derive(Debug, Clone)]
pub struct PreemptibleRetry {
    before: RetryPolicy,
    after: RetryPolicy,
}

impl PreemptibleRetry {
    /// Create a coordinator using `before` until the condition holds and
    /// `after` from then on.
    pub fn new(before: RetryPolicy, after: RetryPolicy) -> Self {
        Self { before, after }
    }

    /// The policy governing preemptible waits.
    pub fn before(&self) -> &RetryPolicy {
        &self.before
    }

    /// The policy governing once the condition has been observed.
    pub fn after(&self) -> &RetryPolicy {
        &self.after
    }

    /// Advance `status` by one retry, waiting either preemptibly (before the
    /// condition) or fully (after it).
    ///
    /// In the `Before` phase the condition is checked under the mutex. If it
    /// holds, the loop moves to `After` with a fresh status and the "after"
    /// policy is applied with a real sleep. Otherwise the "before" policy is
    /// applied and the thread waits for its delay, returning early with
    /// `condition_signalled = true` if the condition becomes true meanwhile.
    ///
    /// The reset also happens when the condition turned true between waits,
    /// so that no wait observed it and the incoming status has
    /// `condition_signalled = false`.
    ///
    /// Returns `None` when the governing policy stops.
    pub fn apply_and_preemptible_delay<S, F>(
        &self,
        preemption: &mut Preemption<'_, S, F>,
        status: PreemptibleRetryStatus,
    ) -> Option<PreemptibleRetryStatus>
    where
        F: FnMut(&S) -> bool,
    {
        if status.phase == Phase::After {
            return self.apply_after(status.status);
        }

        let guard = preemption.lock();

        if preemption.holds(&guard) {
            drop(guard);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                policy = %self.after.name(),
                previous = %status,
                "condition observed, switching retry policy"
            );

            return self.apply_after(RetryStatus::new());
        }

        let next = self.before.apply(status.status)?;
        let delay = next.previous_delay.unwrap_or_default();
        let outcome = preemption.wait_locked(guard, delay);

        #[cfg(feature = "tracing")]
        if outcome.is_preempted() {
            tracing::debug!(policy = %self.before.name(), status = %next, "retry delay preempted");
        }

        Some(PreemptibleRetryStatus::before(next, outcome.is_preempted()))
    }

    /// Run `action` until `should_retry` declines or the governing policy
    /// stops, with waits preemptible by `condition`.
    ///
    /// Same loop shape as [`RetryPolicy::retry`]: the last result is returned
    /// as-is once retries are exhausted.
    pub fn retry<S, F, T, P, A>(
        &self,
        condvar: &Condvar,
        mutex: &Mutex<S>,
        condition: F,
        mut should_retry: P,
        mut action: A,
    ) -> T
    where
        F: FnMut(&S) -> bool,
        P: FnMut(&PreemptibleRetryStatus, &T) -> bool,
        A: FnMut(&PreemptibleRetryStatus) -> T,
    {
        let mut preemption = Preemption::new(condvar, mutex, condition);
        let mut status = PreemptibleRetryStatus::new();

        loop {
            let result = action(&status);

            if !should_retry(&status, &result) {
                return result;
            }

            match self.apply_and_preemptible_delay(&mut preemption, status) {
                Some(next) => status = next,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%status, "preemptible retries exhausted");
                    return result;
                }
            }
        }
    }

    /// Replay both phases without waiting or signalling.
    ///
    /// Yields up to `n_before` statuses from the "before" policy
    /// (`condition_signalled = false`), then up to `n_after` statuses from the
    /// "after" policy starting over from a fresh status
    /// (`condition_signalled = true`). Each phase ends early when its policy
    /// stops.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_algebra::policies::{constant_delay, exponential_backoff, limit_retries};
    /// use retry_algebra::PreemptibleRetry;
    /// use std::time::Duration;
    ///
    /// let policy = PreemptibleRetry::new(
    ///     constant_delay(Duration::from_millis(100)) + limit_retries(2),
    ///     exponential_backoff(Duration::from_millis(1)),
    /// );
    ///
    /// let steps: Vec<_> = policy
    ///     .simulate(5, 3)
    ///     .map(|s| (s.iteration_number, s.condition_signalled))
    ///     .collect();
    ///
    /// assert_eq!(steps, vec![(1, false), (2, false), (1, true), (2, true), (3, true)]);
    /// ```
    pub fn simulate(
        &self,
        n_before: usize,
        n_after: usize,
    ) -> impl Iterator<Item = PreemptibleRetryStatus> + '_ {
        let before = self
            .before
            .simulate(n_before)
            .map(|status| PreemptibleRetryStatus::before(status, false));
        let after = self
            .after
            .simulate(n_after)
            .map(|status| PreemptibleRetryStatus::after(status, true));

        before.chain(after)
    }

    fn apply_after(&self, status: RetryStatus) -> Option<PreemptibleRetryStatus> {
        self.after
            .apply_and_delay(status)
            .map(|next| PreemptibleRetryStatus::after(next, false))
    }
}
