//! Tests for utility functions

use prometheus_read_mostly::util::{init_tracing, monotonic_nanos, now_ms};
use std::thread;
use std::time::Duration;

#[test]
fn test_now_ms_is_wall_clock() {
    // 2020-01-01T00:00:00Z
    assert!(now_ms() > 1_577_836_800_000);
}

#[test]
fn test_monotonic_nanos_advances() {
    let before = monotonic_nanos();
    thread::sleep(Duration::from_millis(2));
    let after = monotonic_nanos();
    assert!(after >= before + 1_000_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
