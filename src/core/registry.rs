//! Participant registry.
//!
//! Every thread that touches a coordinator gets one [`ReaderRecord`], cached in
//! the coordinator's [`ThreadLocal`] and appended once to its participant list. The
//! list is copy-on-write behind an [`ArcSwap`]: appends and removals are CAS
//! loops, and scans work on a snapshot that concurrent changes never disturb.
//!
//! When a thread exits, a std thread-local destructor marks its records dead.
//! Dead records are swept out of the list at most once per sweep interval.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::{ArcSwap, Guard};
use thread_local::ThreadLocal;
use tracing::{debug, trace, warn};

use super::error::LockError;
use super::events::{build_lock_event, LockEventKind, LockEventSink};
use super::record::ReaderRecord;
use super::state::{ReadToken, ReaderState};
use crate::util::clock::monotonic_nanos;

static NEXT_COORDINATOR_ID: AtomicU64 = AtomicU64::new(1);

type Snapshot = Guard<Arc<Vec<Arc<ReaderRecord>>>>;

/// Records created by the current thread, marked dead when the thread exits.
#[derive(Default)]
struct ExitMarker {
    records: RefCell<Vec<Weak<ReaderRecord>>>,
}

impl ExitMarker {
    fn track(&self, record: &Arc<ReaderRecord>) {
        let mut records = self.records.borrow_mut();
        records.retain(|r| r.strong_count() > 0);
        records.push(Arc::downgrade(record));
    }
}

impl Drop for ExitMarker {
    fn drop(&mut self) {
        for record in self.records.get_mut().iter().filter_map(Weak::upgrade) {
            record.mark_dead();
        }
    }
}

thread_local! {
    static EXIT_MARKER: ExitMarker = ExitMarker::default();
}

/// Which parked waiter a release woke, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Woken {
    Writer,
    Intent,
    Reader,
    Nobody,
}

/// The participant list of one coordinator.
pub(crate) struct Participants {
    coordinator_id: u64,
    records: ArcSwap<Vec<Arc<ReaderRecord>>>,
    local: ThreadLocal<RefCell<Option<Arc<ReaderRecord>>>>,
    last_sweep_nanos: AtomicU64,
    sweep_interval_nanos: u64,
    events: Option<Arc<dyn LockEventSink>>,
}

impl Participants {
    pub(crate) fn new(sweep_interval: Duration, events: Option<Arc<dyn LockEventSink>>) -> Self {
        Self {
            coordinator_id: NEXT_COORDINATOR_ID.fetch_add(1, Ordering::Relaxed),
            records: ArcSwap::from_pointee(Vec::new()),
            local: ThreadLocal::new(),
            last_sweep_nanos: AtomicU64::new(monotonic_nanos()),
            sweep_interval_nanos: u64::try_from(sweep_interval.as_nanos()).unwrap_or(u64::MAX),
            events,
        }
    }

    pub(crate) const fn coordinator_id(&self) -> u64 {
        self.coordinator_id
    }

    /// The calling thread's record, created and registered on first use.
    pub(crate) fn current(&self) -> Arc<ReaderRecord> {
        if EXIT_MARKER.try_with(|_| ()).is_err() {
            // Thread-local storage is being torn down; nothing would mark the
            // record dead, so it stays listed until the coordinator is dropped.
            warn!(
                coordinator_id = self.coordinator_id,
                "lock used during thread teardown; registering uncached participant"
            );
            let record = Arc::new(ReaderRecord::for_current_thread(self.coordinator_id));
            self.register(&record);
            return record;
        }

        let slot = self.local.get_or(|| RefCell::new(None));
        if let Some(record) = slot.borrow().as_ref().filter(|r| r.is_current_thread()) {
            return Arc::clone(record);
        }

        // Empty, or left behind by an exited thread whose id was recycled.
        let record = Arc::new(ReaderRecord::for_current_thread(self.coordinator_id));
        self.register(&record);
        let _ = EXIT_MARKER.try_with(|marker| marker.track(&record));
        *slot.borrow_mut() = Some(Arc::clone(&record));
        record
    }

    /// The calling thread's record if it already has one. Never registers.
    pub(crate) fn existing(&self) -> Option<Arc<ReaderRecord>> {
        self.local
            .get()?
            .borrow()
            .as_ref()
            .filter(|r| r.is_current_thread())
            .cloned()
    }

    /// Checks that `token` was issued by this coordinator to the calling thread.
    pub(crate) fn verify_token<'t>(
        &self,
        token: &'t ReadToken,
    ) -> Result<&'t Arc<ReaderRecord>, LockError> {
        let record = &token.record;
        if record.coordinator_id() != self.coordinator_id || !record.is_current_thread() {
            return Err(LockError::ForeignToken);
        }
        Ok(record)
    }

    fn register(&self, record: &Arc<ReaderRecord>) {
        self.maybe_sweep();
        loop {
            let cur = self.records.load_full();
            let mut next = Vec::with_capacity(cur.len() + 1);
            next.extend(cur.iter().cloned());
            next.push(Arc::clone(record));
            let prev = self.records.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                trace!(
                    coordinator_id = self.coordinator_id,
                    record_id = record.id(),
                    "participant registered"
                );
                return;
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.records.load()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.load().len()
    }

    /// Whether any live participant other than `except` holds a read lock.
    pub(crate) fn any_reading(&self, except: u64) -> bool {
        self.snapshot()
            .iter()
            .any(|r| r.id() != except && r.is_alive() && r.state() == ReaderState::Read)
    }

    /// Wakes one parked waiter, preferring writers over intent holders over
    /// readers. Runs the rate-limited sweep when nobody was parked.
    pub(crate) fn wake_waiters(&self) -> Woken {
        let snapshot = self.snapshot();
        let parked_in = |state: ReaderState| {
            snapshot
                .iter()
                .find(|r| r.is_parked() && r.state() == state)
                .cloned()
        };
        let woken = if let Some(writer) = parked_in(ReaderState::Write) {
            self.unpark(&writer, LockEventKind::WriterUnparked);
            Woken::Writer
        } else if let Some(intent) = parked_in(ReaderState::WriteIntent) {
            self.unpark(&intent, LockEventKind::IntentUnparked);
            Woken::Intent
        } else if let Some(reader) = parked_in(ReaderState::ReadRequested) {
            self.unpark(&reader, LockEventKind::ReaderUnparked);
            Woken::Reader
        } else {
            Woken::Nobody
        };
        drop(snapshot);
        if woken == Woken::Nobody {
            self.maybe_sweep();
        }
        woken
    }

    /// Wakes one parked reader other than `except`.
    ///
    /// A reader that was woken and got its lock calls this, so releasing a
    /// writer drains the whole queue of parked readers one hand-off at a time.
    pub(crate) fn wake_next_reader(&self, except: u64) -> bool {
        let next = self
            .snapshot()
            .iter()
            .find(|r| r.id() != except && r.is_parked() && r.state() == ReaderState::ReadRequested)
            .cloned();
        next.is_some_and(|reader| {
            self.unpark(&reader, LockEventKind::ReaderUnparked);
            true
        })
    }

    fn unpark(&self, record: &ReaderRecord, kind: LockEventKind) {
        trace!(record_id = record.id(), ?kind, "unparking waiter");
        record.unpark();
        self.emit(kind, Some(record));
    }

    /// Sweeps dead records if the sweep interval has elapsed since the last one.
    pub(crate) fn maybe_sweep(&self) -> usize {
        let now = monotonic_nanos();
        let last = self.last_sweep_nanos.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.sweep_interval_nanos {
            return 0;
        }
        if self
            .last_sweep_nanos
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return 0;
        }
        self.sweep()
    }

    /// Drops records of dead threads from the list. Returns how many went.
    pub(crate) fn sweep(&self) -> usize {
        self.last_sweep_nanos.store(monotonic_nanos(), Ordering::Relaxed);
        loop {
            let cur = self.records.load_full();
            if cur.iter().all(|r| r.is_alive()) {
                return 0;
            }
            let next: Vec<Arc<ReaderRecord>> =
                cur.iter().filter(|r| r.is_alive()).cloned().collect();
            let removed = cur.len() - next.len();
            let prev = self.records.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                for dead in cur.iter().filter(|r| !r.is_alive()) {
                    if dead.state() == ReaderState::Read {
                        warn!(record_id = dead.id(), "participant thread exited while reading");
                    }
                }
                debug!(
                    coordinator_id = self.coordinator_id,
                    removed, "swept dead participants"
                );
                self.emit(LockEventKind::DeadParticipantsSwept(removed), None);
                return removed;
            }
        }
    }

    pub(crate) fn emit(&self, kind: LockEventKind, record: Option<&ReaderRecord>) {
        if let Some(sink) = &self.events {
            sink.record(build_lock_event(kind, record));
        }
    }
}
