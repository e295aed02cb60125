//! Loading policies from JSON configuration
#![cfg(feature = "serde")]

use retry_algebra::testing::FixedRandom;
use retry_algebra::{ConfigError, Phase, PolicyConfig, PreemptibleConfig, RetryStatus};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_parse_nested_policy() {
    let json = r#"{
        "kind": "combine",
        "policies": [
            {
                "kind": "cap_delay",
                "max_delay_us": 40,
                "policy": { "kind": "exponential_backoff", "base_us": 10 }
            },
            { "kind": "limit_retries", "limit": 5 }
        ]
    }"#;

    let config: PolicyConfig = serde_json::from_str(json).unwrap();
    let policy = config.build().unwrap();

    let delays: Vec<_> = policy
        .simulate(10)
        .map(|s| s.previous_delay.unwrap().as_micros())
        .collect();
    assert_eq!(delays, vec![10, 20, 40, 40, 40]);
}

#[test]
fn test_unit_variant_uses_tag_only() {
    let config: PolicyConfig = serde_json::from_str(r#"{ "kind": "never_retry" }"#).unwrap();
    assert_eq!(config, PolicyConfig::NeverRetry);

    let json = serde_json::to_string(&PolicyConfig::NeverRetry).unwrap();
    assert_eq!(json, r#"{"kind":"never_retry"}"#);
}

#[test]
fn test_serialize_round_trips() {
    let config = PolicyConfig::LimitCumulativeDelay {
        cumulative_limit_us: 30_000_000,
        policy: Box::new(PolicyConfig::DecorrelatedJitterBackoff { base_us: 10 }),
    };

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["kind"], "limit_cumulative_delay");
    assert_eq!(json["policy"]["kind"], "decorrelated_jitter_backoff");

    let back: PolicyConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_negative_value_parses_but_fails_to_build() {
    let config: PolicyConfig =
        serde_json::from_str(r#"{ "kind": "full_jitter", "max_delay_us": -250 }"#).unwrap();

    let err = config.build().unwrap_err();
    assert_eq!(
        err,
        ConfigError::NegativeDuration {
            field: "max_delay_us",
            micros: -250
        }
    );
    assert_eq!(
        err.to_string(),
        "max_delay_us must be a non-negative duration, got -250us"
    );
}

#[test]
fn test_unknown_kind_is_rejected() {
    let result = serde_json::from_str::<PolicyConfig>(r#"{ "kind": "linear", "step_us": 5 }"#);
    assert!(result.is_err());
}

#[test]
fn test_preemptible_config() {
    let json = r#"{
        "before": { "kind": "constant_delay", "delay_us": 1000000 },
        "after": {
            "kind": "combine",
            "policies": [
                { "kind": "equal_jitter_backoff", "base_us": 100 },
                { "kind": "limit_retries", "limit": 2 }
            ]
        }
    }"#;

    let config: PreemptibleConfig = serde_json::from_str(json).unwrap();
    let policy = config.build_with(Arc::new(FixedRandom(0))).unwrap();

    let steps: Vec<_> = policy
        .simulate(1, 10)
        .map(|s| (s.phase, s.previous_delay.unwrap()))
        .collect();

    assert_eq!(
        steps,
        vec![
            (Phase::Before, Duration::from_secs(1)),
            (Phase::After, Duration::from_micros(50)),
            (Phase::After, Duration::from_micros(100)),
        ]
    );
}

#[test]
fn test_retry_status_serializes() {
    let status = RetryStatus::new().advance(Duration::from_millis(3));
    let json = serde_json::to_string(&status).unwrap();
    let back: RetryStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, status);
}

#[test]
fn test_phase_is_snake_case() {
    assert_eq!(serde_json::to_string(&Phase::After).unwrap(), r#""after""#);
}
