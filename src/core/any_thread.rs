//! Coordinator whose writer may be any thread.
//!
//! The exclusive owner (write or write-intent holder) is a record reference
//! claimed by compare-and-swap, so ownership floats between threads. Readers
//! only look at `write_requested`; write-intent does not keep them out.
//!
//! Per-thread state machine:
//!
//! ```text
//! CALM -> READ_REQ -> READ -> CALM          read
//! CALM -> WRITE_INTENT -> CALM              intent
//! CALM | WRITE_INTENT -> WRITE -> CALM      write (upgrade from intent)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use arc_swap::ArcSwapOption;
use tracing::{debug, trace};

use super::cancellation::{CancellationCheck, NeverCanceled};
use super::coordinator::ReadWriteCoordinator;
use super::error::LockError;
use super::events::{LockEventKind, LockEventSink};
use super::read_path::{ImpatientScope, ReadPath};
use super::record::ReaderRecord;
use super::registry::Participants;
use super::state::{ReadToken, ReaderState, TryRead};
use crate::config::CoordinatorConfig;

/// Read-mostly lock where any thread may take write-intent or write.
pub struct AnyThreadCoordinator {
    config: CoordinatorConfig,
    participants: Participants,
    owner: ArcSwapOption<ReaderRecord>,
    write_requested: AtomicBool,
    write_acquired: AtomicBool,
    write_suspended: AtomicBool,
    cancellation: Arc<dyn CancellationCheck>,
}

impl AnyThreadCoordinator {
    /// Create a coordinator from validated configuration.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: CoordinatorConfig) -> Result<Self, LockError> {
        config.validate().map_err(LockError::InvalidConfig)?;
        Ok(Self::from_parts(config, Arc::new(NeverCanceled), None))
    }

    /// Create a coordinator with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::from_parts(CoordinatorConfig::default(), Arc::new(NeverCanceled), None)
    }

    pub(crate) fn from_parts(
        config: CoordinatorConfig,
        cancellation: Arc<dyn CancellationCheck>,
        events: Option<Arc<dyn LockEventSink>>,
    ) -> Self {
        let participants = Participants::new(config.gc_interval(), events);
        debug!(
            coordinator_id = participants.coordinator_id(),
            spin_iterations = config.spin_iterations,
            park_timeout_micros = config.park_timeout_micros,
            "any-thread coordinator created"
        );
        Self {
            config,
            participants,
            owner: ArcSwapOption::empty(),
            write_requested: AtomicBool::new(false),
            write_acquired: AtomicBool::new(false),
            write_suspended: AtomicBool::new(false),
            cancellation,
        }
    }

    /// Identifier distinguishing this coordinator in logs and events.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.participants.coordinator_id()
    }

    /// Thread currently holding write or write-intent, if any.
    #[must_use]
    pub fn exclusive_owner(&self) -> Option<ThreadId> {
        let owner = self.owner.load();
        Option::as_ref(&*owner).map(|owner| owner.thread().id())
    }

    /// Whether a writer holds or is draining readers for the write lock.
    ///
    /// A writer still queued behind another thread's write-intent has not
    /// claimed ownership yet and does not count, so impatient readers keep
    /// being admitted while it waits.
    #[must_use]
    pub fn is_write_requested(&self) -> bool {
        self.write_requested.load(Ordering::SeqCst)
    }

    fn is_owner(&self, me: &Arc<ReaderRecord>) -> bool {
        let owner = self.owner.load();
        matches!(&*owner, Some(o) if Arc::ptr_eq(o, me))
    }

    fn read_path(&self) -> ReadPath<'_, impl Fn() -> bool + '_> {
        ReadPath {
            participants: &self.participants,
            config: &self.config,
            cancellation: self.cancellation.as_ref(),
            writer_pending: move || self.write_requested.load(Ordering::SeqCst),
        }
    }

    fn try_claim_owner(&self, me: &Arc<ReaderRecord>) -> bool {
        let prev = self
            .owner
            .compare_and_swap(&None::<Arc<ReaderRecord>>, Some(Arc::clone(me)));
        prev.is_none()
    }

    /// Spin, then park, until `me` is the exclusive owner.
    fn claim_owner(&self, me: &Arc<ReaderRecord>, parked_event: LockEventKind) {
        let mut backoff = self.config.backoff();
        loop {
            if self.try_claim_owner(me) {
                return;
            }
            if backoff.should_park() {
                if backoff.is_first_park() {
                    trace!(record_id = me.id(), state = %me.state(), "parking for exclusive owner");
                    self.participants.emit(parked_event, Some(me));
                }
                me.set_parked(true);
                if self.try_claim_owner(me) {
                    me.set_parked(false);
                    return;
                }
                backoff.snooze();
                me.set_parked(false);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Spin, then park, until no other participant reads.
    fn drain_readers(&self, me: &ReaderRecord) {
        let mut backoff = self.config.backoff();
        loop {
            if !self.participants.any_reading(me.id()) {
                return;
            }
            if backoff.should_park() {
                if backoff.is_first_park() {
                    trace!(record_id = me.id(), "writer waiting for readers to drain");
                    self.participants
                        .emit(LockEventKind::WriterParked, Some(me));
                }
                me.set_parked(true);
                if !self.participants.any_reading(me.id()) {
                    me.set_parked(false);
                    return;
                }
                backoff.snooze();
                me.set_parked(false);
            } else {
                backoff.snooze();
            }
        }
    }

    fn holds_write(&self, me: &Arc<ReaderRecord>) -> bool {
        me.state() == ReaderState::Write
            && self.write_acquired.load(Ordering::SeqCst)
            && self.is_owner(me)
    }

    fn release_owner(&self, me: &ReaderRecord) {
        me.set_state(ReaderState::Calm);
        self.owner.store(None);
        self.participants.wake_waiters();
    }
}

impl ReadWriteCoordinator for AnyThreadCoordinator {
    fn start_read(&self) -> Result<Option<ReadToken>, LockError> {
        let me = self.participants.current();
        if self.is_owner(&me) {
            return Ok(None);
        }
        self.read_path().acquire(me)
    }

    fn end_read(&self, token: Option<ReadToken>) -> Result<(), LockError> {
        let Some(token) = token else {
            return Ok(());
        };
        self.read_path().release(&token)?;
        if self.write_requested.load(Ordering::SeqCst) {
            let owner = self.owner.load();
            if let Some(owner) = &*owner {
                owner.unpark();
            }
        }
        Ok(())
    }

    fn start_try_read(&self) -> Result<TryRead, LockError> {
        let me = self.participants.current();
        if self.is_owner(&me) {
            return Ok(TryRead::AlreadyHeld);
        }
        self.read_path().try_acquire(me)
    }

    fn write_intent_lock(&self) -> Result<(), LockError> {
        let me = self.participants.current();
        let state = me.state();
        if state != ReaderState::Calm {
            return Err(LockError::illegal(state, ReaderState::WriteIntent));
        }
        me.set_state(ReaderState::WriteIntent);
        self.claim_owner(&me, LockEventKind::IntentParked);
        trace!(record_id = me.id(), "write-intent acquired");
        Ok(())
    }

    fn write_intent_unlock(&self) -> Result<(), LockError> {
        let me = self.participants.current();
        let state = me.state();
        if state != ReaderState::WriteIntent || !self.is_owner(&me) {
            return Err(LockError::illegal(state, ReaderState::Calm));
        }
        self.release_owner(&me);
        Ok(())
    }

    fn write_lock(&self) -> Result<(), LockError> {
        let me = self.participants.current();
        match me.state() {
            ReaderState::Calm => {
                me.set_state(ReaderState::Write);
                self.claim_owner(&me, LockEventKind::WriterParked);
            }
            ReaderState::WriteIntent if self.is_owner(&me) => {
                me.set_state(ReaderState::Write);
            }
            other => return Err(LockError::illegal(other, ReaderState::Write)),
        }
        self.write_requested.store(true, Ordering::SeqCst);
        self.drain_readers(&me);
        self.write_acquired.store(true, Ordering::SeqCst);
        trace!(record_id = me.id(), "write lock acquired");
        Ok(())
    }

    fn write_unlock(&self) -> Result<(), LockError> {
        let me = self.participants.current();
        if !self.holds_write(&me) {
            return Err(LockError::illegal(me.state(), ReaderState::Calm));
        }
        self.write_acquired.store(false, Ordering::SeqCst);
        self.write_requested.store(false, Ordering::SeqCst);
        self.release_owner(&me);
        Ok(())
    }

    fn write_suspend_while_pumping(&self, pump: &mut dyn FnMut()) -> Result<(), LockError> {
        let me = self.participants.current();
        if !self.holds_write(&me) {
            return Err(LockError::illegal(me.state(), ReaderState::Calm));
        }
        let previous = self.write_suspended.swap(true, Ordering::SeqCst);
        debug!(record_id = me.id(), "suspending write lock to pump events");
        self.participants
            .emit(LockEventKind::WriteSuspended, Some(&me));
        self.write_unlock()?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pump()));

        let relocked = self.write_lock();
        self.write_suspended.store(previous, Ordering::SeqCst);
        self.participants.emit(LockEventKind::WriteResumed, Some(&me));
        match outcome {
            Ok(()) => relocked,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn execute_by_impatient_reader(&self, action: &mut dyn FnMut()) -> Result<(), LockError> {
        let _scope = ImpatientScope::enter(self.participants.current());
        action();
        Ok(())
    }

    fn is_write_locked(&self) -> bool {
        self.write_acquired.load(Ordering::SeqCst)
    }

    fn is_write_intent_locked(&self) -> bool {
        let owner = self.owner.load();
        matches!(&*owner, Some(o) if o.state() == ReaderState::WriteIntent)
    }

    fn is_read_locked_by_this_thread(&self) -> bool {
        self.participants
            .existing()
            .is_some_and(|me| me.state() == ReaderState::Read)
    }

    fn is_read_allowed(&self) -> bool {
        self.participants
            .existing()
            .is_some_and(|me| self.is_owner(&me) || me.state() == ReaderState::Read)
    }

    fn is_write_suspended(&self) -> bool {
        self.write_suspended.load(Ordering::SeqCst)
    }

    fn is_in_impatient_reader(&self) -> bool {
        self.participants
            .existing()
            .is_some_and(|me| me.is_impatient())
    }

    fn participant_count(&self) -> usize {
        self.participants.len()
    }

    fn sweep_dead_participants(&self) -> usize {
        self.participants.sweep()
    }
}
