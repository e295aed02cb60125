//! Log events emitted by retry loops
#![cfg(feature = "tracing")]

use retry_algebra::policies::{constant_delay, limit_retries, never_retry};
use retry_algebra::preemptible::signal;
use retry_algebra::PreemptibleRetry;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_exhausted_retry_logs_policy_name() {
    let result: Result<(), &str> = limit_retries(2).retry(
        |_, result: &Result<(), &str>| result.is_err(),
        |_| Err("down"),
    );

    assert_eq!(result, Err("down"));
    assert!(logs_contain("retry policy applied"));
    assert!(logs_contain("retries exhausted"));
    assert!(logs_contain("limit_retries(2)"));
}

#[traced_test]
#[test]
fn test_stop_is_logged_with_status() {
    assert_eq!(never_retry().apply(Default::default()), None);

    assert!(logs_contain("retry policy stopped"));
    assert!(logs_contain("iteration_number: 0"));
}

#[traced_test]
#[test]
fn test_successful_first_attempt_logs_nothing() {
    let result: Result<u32, &str> = limit_retries(2).retry(
        |_, result: &Result<u32, &str>| result.is_err(),
        |_| Ok(7),
    );

    assert_eq!(result, Ok(7));
    assert!(!logs_contain("retries exhausted"));
}

#[traced_test]
#[test]
fn test_preemptible_switch_is_logged() {
    let condvar = Condvar::new();
    let state = Mutex::new(false);
    signal(&condvar, &state, |ready| *ready = true);

    let policy = PreemptibleRetry::new(
        constant_delay(Duration::from_secs(30)),
        limit_retries(1).named("after-policy"),
    );

    policy.retry(
        &condvar,
        &state,
        |ready: &bool| *ready,
        |_, _: &()| true,
        |_| (),
    );

    assert!(logs_contain("condition observed, switching retry policy"));
    assert!(logs_contain("after-policy"));
    assert!(logs_contain("preemptible retries exhausted"));
}
