//! Tests for configuration validation and loading

use prometheus_read_mostly::config::{CoordinatorConfig, ThreadingMode};
use std::time::Duration;

#[test]
fn test_default_config_is_valid() {
    let cfg = CoordinatorConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.mode, ThreadingMode::AnyThread);
    assert!(cfg.allow_implicit_read);
}

#[test]
fn test_config_invalid_park_timeout() {
    let zero = CoordinatorConfig::new().with_park_timeout(Duration::ZERO);
    assert!(zero.validate().is_err());

    let too_long = CoordinatorConfig::new().with_park_timeout(Duration::from_secs(2));
    assert!(too_long.validate().is_err());
}

#[test]
fn test_config_invalid_gc_interval() {
    let invalid = CoordinatorConfig::new().with_gc_interval(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "mode": "write_thread",
        "spin_iterations": 0,
        "park_timeout_micros": 500,
        "allow_implicit_read": false
    }"#;
    let cfg = CoordinatorConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.mode, ThreadingMode::WriteThread);
    assert_eq!(cfg.spin_iterations, 0);
    assert_eq!(cfg.park_timeout(), Duration::from_micros(500));
    assert_eq!(cfg.gc_interval_micros, 1_000);
    assert!(!cfg.allow_implicit_read);
}

#[test]
fn test_config_from_json_rejects_invalid_values() {
    let err = CoordinatorConfig::from_json_str(r#"{"gc_interval_micros": 0}"#).unwrap_err();
    assert!(err.contains("gc_interval_micros"));

    let err = CoordinatorConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_config_round_trips_through_serde() {
    let cfg = CoordinatorConfig::new()
        .with_mode(ThreadingMode::WriteThread)
        .with_spin_iterations(12);
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"write_thread\""));
    let back = CoordinatorConfig::from_json_str(&json).unwrap();
    assert_eq!(back.mode, ThreadingMode::WriteThread);
    assert_eq!(back.spin_iterations, 12);
}

#[test]
fn test_config_from_lookup_unknown_mode() {
    let err = CoordinatorConfig::from_lookup(|key| {
        (key == "PROMETHEUS_RW_MODE").then(|| "sometimes".to_string())
    })
    .unwrap_err();
    assert!(err.contains("sometimes"));
}
