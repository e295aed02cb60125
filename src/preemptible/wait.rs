//! Cancellable waits on a caller-owned mutex and condition variable.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How a [`Preemption::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitOutcome {
    /// The condition became true before the timeout elapsed.
    Preempted,
    /// The full timeout elapsed with the condition still false.
    TimedOut,
}

impl WaitOutcome {
    /// Returns true if the wait was cut short by the condition.
    pub fn is_preempted(self) -> bool {
        matches!(self, Self::Preempted)
    }
}

/// A condition that can cut a wait short.
///
/// Bundles the caller's condition variable, the mutex guarding their state and
/// a predicate over that state. The predicate is only ever evaluated while the
/// mutex is held, and waits re-check it on every wakeup, so neither spurious
/// wakeups nor signals sent between the check and the wait are lost.
///
/// The state must only be modified while holding the mutex, followed by a
/// `notify_all` on the condition variable; [`signal`] does both.
///
/// Mutex poisoning is ignored: the guarded state belongs to the caller and
/// this type never writes to it.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::preemptible::{signal, Preemption, WaitOutcome};
/// use std::sync::{Condvar, Mutex};
/// use std::time::Duration;
///
/// let condvar = Condvar::new();
/// let leader_elected = Mutex::new(false);
///
/// std::thread::scope(|scope| {
///     scope.spawn(|| signal(&condvar, &leader_elected, |elected| *elected = true));
///
///     let mut preemption = Preemption::new(&condvar, &leader_elected, |elected: &bool| *elected);
///     // Either the signal arrives first or it ends this wait early.
///     assert_eq!(preemption.wait(Duration::from_secs(30)), WaitOutcome::Preempted);
/// });
/// ```
pub struct Preemption<'a, S, F> {
    condvar: &'a Condvar,
    mutex: &'a Mutex<S>,
    condition: F,
}

impl<'a, S, F> Preemption<'a, S, F>
where
    F: FnMut(&S) -> bool,
{
    /// Create a preemption over `mutex`'s state, woken through `condvar`.
    pub fn new(condvar: &'a Condvar, mutex: &'a Mutex<S>, condition: F) -> Self {
        Self {
            condvar,
            mutex,
            condition,
        }
    }

    /// Evaluate the condition under the mutex.
    pub fn is_signalled(&mut self) -> bool {
        let guard = self.lock();
        self.holds(&guard)
    }

    /// Block for up to `timeout`, returning early once the condition holds.
    ///
    /// Returns [`WaitOutcome::Preempted`] immediately if it already holds.
    pub fn wait(&mut self, timeout: Duration) -> WaitOutcome {
        let guard = self.lock();
        self.wait_locked(guard, timeout)
    }

    pub(super) fn lock(&self) -> MutexGuard<'a, S> {
        let mutex: &'a Mutex<S> = self.mutex;
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn holds(&mut self, guard: &MutexGuard<'a, S>) -> bool {
        (self.condition)(&**guard)
    }

    /// Wait with the mutex already held, so the condition cannot change
    /// between the caller's last check and the start of the wait.
    pub(super) fn wait_locked(&mut self, guard: MutexGuard<'a, S>, timeout: Duration) -> WaitOutcome {
        let condition = &mut self.condition;
        let (_guard, result) = self
            .condvar
            .wait_timeout_while(guard, timeout, |state| !condition(&*state))
            .unwrap_or_else(PoisonError::into_inner);

        if result.timed_out() {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Preempted
        }
    }
}

impl<S, F> fmt::Debug for Preemption<'_, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preemption")
            .field("condvar", self.condvar)
            .finish_non_exhaustive()
    }
}

/// Update the shared state under its mutex, then wake every waiter.
pub fn signal<S>(condvar: &Condvar, mutex: &Mutex<S>, update: impl FnOnce(&mut S)) {
    {
        let mut state = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut *state);
    }
    condvar.notify_all();
}

#[cfg(test)]
mod wait_tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_when_condition_stays_false() {
        let condvar = Condvar::new();
        let state = Mutex::new(false);
        let mut preemption = Preemption::new(&condvar, &state, |s: &bool| *s);

        let start = Instant::now();
        assert_eq!(
            preemption.wait(Duration::from_millis(20)),
            WaitOutcome::TimedOut
        );
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_returns_immediately_when_condition_holds() {
        let condvar = Condvar::new();
        let state = Mutex::new(true);
        let mut preemption = Preemption::new(&condvar, &state, |s: &bool| *s);

        let start = Instant::now();
        assert!(preemption.wait(Duration::from_secs(30)).is_preempted());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let condvar = Condvar::new();
        let state = Mutex::new(0u32);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                signal(&condvar, &state, |n| *n = 3);
            });

            let mut preemption = Preemption::new(&condvar, &state, |n: &u32| *n >= 3);
            let start = Instant::now();
            assert_eq!(
                preemption.wait(Duration::from_secs(30)),
                WaitOutcome::Preempted
            );
            assert!(start.elapsed() < Duration::from_secs(5));
        });
    }

    #[test]
    fn test_notify_without_condition_keeps_waiting() {
        let condvar = Condvar::new();
        let state = Mutex::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(5));
                // Spurious from the waiter's point of view.
                condvar.notify_all();
            });

            let mut preemption = Preemption::new(&condvar, &state, |s: &bool| *s);
            assert_eq!(
                preemption.wait(Duration::from_millis(50)),
                WaitOutcome::TimedOut
            );
        });
    }

    #[test]
    fn test_is_signalled() {
        let condvar = Condvar::new();
        let state = Mutex::new(false);
        let mut preemption = Preemption::new(&condvar, &state, |s: &bool| *s);

        assert!(!preemption.is_signalled());
        *state.lock().unwrap() = true;
        assert!(preemption.is_signalled());
    }
}
