//! Lock event sinks.
//!
//! Coordinators report parks, wake-ups, sweeps and write suspension to an
//! optional sink. The in-memory sink lets tests observe wake-up order.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::record::ReaderRecord;
use crate::util::clock::now_ms;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEventKind {
    /// A reader parked waiting for a writer to leave.
    ReaderParked,
    /// A writer parked waiting for exclusivity or for readers to drain.
    WriterParked,
    /// A thread parked waiting for write-intent.
    IntentParked,
    /// A parked writer was woken.
    WriterUnparked,
    /// A parked write-intent waiter was woken.
    IntentUnparked,
    /// A parked reader was woken.
    ReaderUnparked,
    /// Records of dead threads were dropped from the participant list.
    DeadParticipantsSwept(usize),
    /// The write lock was released to pump events.
    WriteSuspended,
    /// The write lock was re-acquired after pumping.
    WriteResumed,
}

/// A single lock event.
#[derive(Debug, Clone)]
pub struct LockEvent {
    /// Event kind.
    pub kind: LockEventKind,
    /// Participant record the event concerns (0 when none).
    pub record_id: u64,
    /// Name of the thread owning that record, if named.
    pub thread_name: Option<String>,
    /// Timestamp milliseconds.
    pub at_ms: u128,
}

/// Destination for lock events.
pub trait LockEventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: LockEvent);
}

/// Bounded in-memory sink for tests and diagnostics.
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<LockEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink keeping at most `max_events` newest events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<LockEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Snapshot of stored event kinds, oldest first.
    #[must_use]
    pub fn kinds(&self) -> Vec<LockEventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Whether an event of `kind` was recorded for `record_id`.
    #[must_use]
    pub fn contains(&self, kind: LockEventKind, record_id: u64) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.kind == kind && e.record_id == record_id)
    }

    /// Drop all stored events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LockEventSink for InMemoryEventSink {
    fn record(&self, event: LockEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink forwarding every event to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl LockEventSink for TracingEventSink {
    fn record(&self, event: LockEvent) {
        tracing::debug!(
            kind = ?event.kind,
            record_id = event.record_id,
            thread = event.thread_name.as_deref().unwrap_or("<unnamed>"),
            "lock event"
        );
    }
}

/// Build an event about `record`.
#[must_use]
pub fn build_lock_event(kind: LockEventKind, record: Option<&ReaderRecord>) -> LockEvent {
    LockEvent {
        kind,
        record_id: record.map_or(0, ReaderRecord::id),
        thread_name: record.and_then(ReaderRecord::thread_name),
        at_ms: now_ms(),
    }
}
