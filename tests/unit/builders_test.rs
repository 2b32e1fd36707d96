//! Tests for coordinator builders

use prometheus_read_mostly::builders::CoordinatorBuilder;
use prometheus_read_mostly::config::{CoordinatorConfig, ThreadingMode};
use prometheus_read_mostly::core::{
    CancellationCheck, CancellationFlag, CoordinatorExt, InMemoryEventSink, LockError,
    LockEventKind, LockEventSink, ReadWriteCoordinator,
};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_builder_rejects_invalid_config() {
    let result = CoordinatorBuilder::new(
        CoordinatorConfig::new().with_park_timeout(Duration::ZERO),
    )
    .build();
    assert!(matches!(result, Err(LockError::InvalidConfig(_))));
}

#[test]
fn test_builder_exposes_config() {
    let builder = CoordinatorBuilder::new(CoordinatorConfig::new().with_spin_iterations(3));
    assert_eq!(builder.config().spin_iterations, 3);
}

#[test]
fn test_builder_any_thread_mode() {
    let lock = CoordinatorBuilder::new(CoordinatorConfig::new().with_mode(ThreadingMode::AnyThread))
        .build()
        .unwrap();
    lock.run_write(|| assert!(lock.is_write_locked())).unwrap();
    assert_eq!(lock.participant_count(), 1);
}

#[test]
fn test_builder_wires_event_sink() {
    let sink = Arc::new(InMemoryEventSink::new(16));
    let lock = CoordinatorBuilder::new(CoordinatorConfig::new())
        .with_event_sink(sink.clone() as Arc<dyn LockEventSink>)
        .build_any_thread()
        .unwrap();
    lock.write_lock().unwrap();
    lock.suspend_write_while(|| ()).unwrap();
    lock.write_unlock().unwrap();

    let kinds = sink.kinds();
    assert_eq!(
        kinds,
        vec![LockEventKind::WriteSuspended, LockEventKind::WriteResumed]
    );
}

#[test]
fn test_builder_wires_cancellation() {
    let flag = CancellationFlag::new();
    let lock = CoordinatorBuilder::new(CoordinatorConfig::new())
        .with_cancellation(Arc::new(flag.clone()) as Arc<dyn CancellationCheck>)
        .build_write_thread()
        .unwrap();
    flag.cancel();
    // Cancellation only matters to readers that have to wait.
    assert!(lock.is_write_thread());
    assert_eq!(lock.run_read(|| 9), Ok(9));
}
