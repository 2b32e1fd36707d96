//! Tests for lock event sinks

use prometheus_read_mostly::core::{
    build_lock_event, InMemoryEventSink, LockEventKind, LockEventSink, TracingEventSink,
};

#[test]
fn test_in_memory_sink_keeps_newest_events() {
    let sink = InMemoryEventSink::new(2);
    sink.record(build_lock_event(LockEventKind::ReaderParked, None));
    sink.record(build_lock_event(LockEventKind::WriterParked, None));
    sink.record(build_lock_event(LockEventKind::WriterUnparked, None));

    assert_eq!(
        sink.kinds(),
        vec![LockEventKind::WriterParked, LockEventKind::WriterUnparked]
    );
    assert!(sink.contains(LockEventKind::WriterUnparked, 0));
    assert!(!sink.contains(LockEventKind::ReaderParked, 0));

    sink.clear();
    assert!(sink.events().is_empty());
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let sink = InMemoryEventSink::new(0);
    sink.record(build_lock_event(LockEventKind::WriteSuspended, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_event_without_record() {
    let event = build_lock_event(LockEventKind::DeadParticipantsSwept(4), None);
    assert_eq!(event.kind, LockEventKind::DeadParticipantsSwept(4));
    assert_eq!(event.record_id, 0);
    assert!(event.thread_name.is_none());
    assert!(event.at_ms > 0);
}

#[test]
fn test_tracing_sink_accepts_events() {
    prometheus_read_mostly::util::init_tracing();
    TracingEventSink.record(build_lock_event(LockEventKind::WriteResumed, None));
}
