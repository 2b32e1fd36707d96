//! Per-thread participant record.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, Thread};

use super::state::ReaderState;

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Lock bookkeeping for one thread on one coordinator.
///
/// All mutable fields are written only by the owning thread. The writer and
/// the wake-up path read them from other threads, so every field is atomic.
/// The `alive` flag is the one exception: it is cleared by the owning
/// thread's thread-local destructor, which still runs on that thread.
pub struct ReaderRecord {
    id: u64,
    coordinator_id: u64,
    thread: Thread,
    state: AtomicU8,
    parked: AtomicBool,
    impatient: AtomicBool,
    alive: AtomicBool,
}

impl ReaderRecord {
    /// Creates a record for the calling thread.
    pub(crate) fn for_current_thread(coordinator_id: u64) -> Self {
        Self {
            id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
            coordinator_id,
            thread: thread::current(),
            state: AtomicU8::new(ReaderState::Calm.as_u8()),
            parked: AtomicBool::new(false),
            impatient: AtomicBool::new(false),
            alive: AtomicBool::new(true),
        }
    }

    /// Unique record identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Identifier of the coordinator this record is registered with.
    #[must_use]
    pub const fn coordinator_id(&self) -> u64 {
        self.coordinator_id
    }

    /// Handle of the owning thread.
    #[must_use]
    pub const fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: ReaderState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Whether the owning thread is parked inside the lock.
    #[must_use]
    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }

    pub(crate) fn set_parked(&self, parked: bool) {
        self.parked.store(parked, Ordering::SeqCst);
    }

    pub(crate) fn is_impatient(&self) -> bool {
        self.impatient.load(Ordering::Relaxed)
    }

    pub(crate) fn replace_impatient(&self, impatient: bool) -> bool {
        self.impatient.swap(impatient, Ordering::Relaxed)
    }

    /// Whether the owning thread is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub(crate) fn is_current_thread(&self) -> bool {
        self.thread.id() == thread::current().id()
    }

    pub(crate) fn unpark(&self) {
        self.thread.unpark();
    }

    pub(crate) fn thread_name(&self) -> Option<String> {
        self.thread.name().map(str::to_owned)
    }
}

impl fmt::Debug for ReaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderRecord")
            .field("id", &self.id)
            .field("coordinator_id", &self.coordinator_id)
            .field("thread", &self.thread.id())
            .field("state", &self.state())
            .field("parked", &self.is_parked())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
