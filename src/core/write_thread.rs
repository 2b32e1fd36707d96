//! Coordinator whose writer is one designated thread.
//!
//! Typical for UI applications: every write happens on the UI thread, chosen
//! once at construction. Because the owner can only ever be that thread,
//! ownership checks are a thread-id comparison and the write thread may read
//! without any lock at all ("implicit read") when the host allows it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};

use tracing::{debug, trace};

use super::cancellation::{CancellationCheck, NeverCanceled};
use super::coordinator::ReadWriteCoordinator;
use super::error::LockError;
use super::events::{LockEventKind, LockEventSink};
use super::read_path::{ImpatientScope, ReadPath};
use super::record::ReaderRecord;
use super::registry::Participants;
use super::state::{ReadToken, ReaderState, TryRead, WriteState};
use crate::config::CoordinatorConfig;

/// Read-mostly lock with write access pinned to one thread.
pub struct WriteThreadCoordinator {
    config: CoordinatorConfig,
    participants: Participants,
    write_thread: Thread,
    write_state: AtomicU8,
    write_intent: AtomicBool,
    write_suspended: AtomicBool,
    allow_implicit_read: AtomicBool,
    cancellation: Arc<dyn CancellationCheck>,
}

impl WriteThreadCoordinator {
    /// Create a coordinator whose write thread is the calling thread.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: CoordinatorConfig) -> Result<Self, LockError> {
        Self::for_thread(config, thread::current())
    }

    /// Create a coordinator whose write thread is `write_thread`.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidConfig`] if `config` fails validation.
    pub fn for_thread(config: CoordinatorConfig, write_thread: Thread) -> Result<Self, LockError> {
        config.validate().map_err(LockError::InvalidConfig)?;
        Ok(Self::from_parts(
            config,
            write_thread,
            Arc::new(NeverCanceled),
            None,
        ))
    }

    pub(crate) fn from_parts(
        config: CoordinatorConfig,
        write_thread: Thread,
        cancellation: Arc<dyn CancellationCheck>,
        events: Option<Arc<dyn LockEventSink>>,
    ) -> Self {
        let participants = Participants::new(config.gc_interval(), events);
        debug!(
            coordinator_id = participants.coordinator_id(),
            write_thread = ?write_thread.id(),
            allow_implicit_read = config.allow_implicit_read,
            "write-thread coordinator created"
        );
        Self {
            allow_implicit_read: AtomicBool::new(config.allow_implicit_read),
            config,
            participants,
            write_thread,
            write_state: AtomicU8::new(WriteState::Initial.as_u8()),
            write_intent: AtomicBool::new(false),
            write_suspended: AtomicBool::new(false),
            cancellation,
        }
    }

    /// Identifier distinguishing this coordinator in logs and events.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.participants.coordinator_id()
    }

    /// The designated write thread.
    #[must_use]
    pub const fn write_thread(&self) -> &Thread {
        &self.write_thread
    }

    /// Whether the calling thread is the write thread.
    #[must_use]
    pub fn is_write_thread(&self) -> bool {
        thread::current().id() == self.write_thread.id()
    }

    /// Current write progress.
    #[must_use]
    pub fn write_state(&self) -> WriteState {
        WriteState::from_u8(self.write_state.load(Ordering::SeqCst))
    }

    fn set_write_state(&self, state: WriteState) {
        self.write_state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Whether the write thread reads without taking a read lock.
    #[must_use]
    pub fn is_implicit_read_allowed(&self) -> bool {
        self.allow_implicit_read.load(Ordering::SeqCst)
    }

    /// Toggle implicit reads on the write thread.
    ///
    /// Only sound while every write happens on the write thread, which this
    /// coordinator enforces.
    pub fn set_implicit_read_allowed(&self, allow: bool) {
        self.allow_implicit_read.store(allow, Ordering::SeqCst);
    }

    fn check_write_thread(&self) -> Result<(), LockError> {
        if self.is_write_thread() {
            Ok(())
        } else {
            Err(LockError::wrong_thread(&self.write_thread))
        }
    }

    fn writer_pending(&self) -> bool {
        self.write_state() != WriteState::Initial
    }

    /// Write thread reading under its own exclusivity or by policy.
    fn reads_implicitly(&self) -> bool {
        self.is_write_thread()
            && (self.is_implicit_read_allowed()
                || self.write_intent.load(Ordering::SeqCst)
                || self.writer_pending())
    }

    fn read_path(&self) -> ReadPath<'_, impl Fn() -> bool + '_> {
        ReadPath {
            participants: &self.participants,
            config: &self.config,
            cancellation: self.cancellation.as_ref(),
            writer_pending: move || self.writer_pending(),
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
                    trace!(record_id = me.id(), "write thread waiting for readers to drain");
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

    fn holds_write(&self) -> bool {
        self.write_state() == WriteState::WriteAcquired
    }
}

impl ReadWriteCoordinator for WriteThreadCoordinator {
    fn start_read(&self) -> Result<Option<ReadToken>, LockError> {
        if self.reads_implicitly() {
            return Ok(None);
        }
        self.read_path().acquire(self.participants.current())
    }

    fn end_read(&self, token: Option<ReadToken>) -> Result<(), LockError> {
        let Some(token) = token else {
            return Ok(());
        };
        self.read_path().release(&token)?;
        if self.writer_pending() {
            self.write_thread.unpark();
        }
        Ok(())
    }

    fn start_try_read(&self) -> Result<TryRead, LockError> {
        if self.reads_implicitly() {
            return Ok(TryRead::AlreadyHeld);
        }
        self.read_path().try_acquire(self.participants.current())
    }

    fn write_intent_lock(&self) -> Result<(), LockError> {
        self.check_write_thread()?;
        let me = self.participants.current();
        let state = me.state();
        if state != ReaderState::Calm {
            return Err(LockError::illegal(state, ReaderState::WriteIntent));
        }
        if self
            .write_intent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LockError::illegal(
                ReaderState::WriteIntent,
                ReaderState::WriteIntent,
            ));
        }
        me.set_state(ReaderState::WriteIntent);
        trace!(record_id = me.id(), "write-intent acquired");
        Ok(())
    }

    fn write_intent_unlock(&self) -> Result<(), LockError> {
        self.check_write_thread()?;
        let me = self.participants.current();
        let state = me.state();
        if state != ReaderState::WriteIntent || !self.write_intent.load(Ordering::SeqCst) {
            return Err(LockError::illegal(state, ReaderState::Calm));
        }
        self.write_intent.store(false, Ordering::SeqCst);
        me.set_state(ReaderState::Calm);
        self.participants.wake_waiters();
        Ok(())
    }

    fn write_lock(&self) -> Result<(), LockError> {
        self.check_write_thread()?;
        let me = self.participants.current();
        match me.state() {
            ReaderState::Calm | ReaderState::WriteIntent => {}
            other => return Err(LockError::illegal(other, ReaderState::Write)),
        }
        me.set_state(ReaderState::Write);
        self.set_write_state(WriteState::WriteRequested);
        self.drain_readers(&me);
        self.set_write_state(WriteState::WriteAcquired);
        trace!(record_id = me.id(), "write lock acquired");
        Ok(())
    }

    fn write_unlock(&self) -> Result<(), LockError> {
        self.check_write_thread()?;
        let me = self.participants.current();
        if !self.holds_write() {
            return Err(LockError::illegal(me.state(), ReaderState::Calm));
        }
        self.set_write_state(WriteState::Initial);
        self.write_intent.store(false, Ordering::SeqCst);
        me.set_state(ReaderState::Calm);
        self.participants.wake_waiters();
        Ok(())
    }

    fn write_suspend_while_pumping(&self, pump: &mut dyn FnMut()) -> Result<(), LockError> {
        self.check_write_thread()?;
        let me = self.participants.current();
        if !self.holds_write() {
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
        self.holds_write()
    }

    fn is_write_intent_locked(&self) -> bool {
        self.write_intent.load(Ordering::SeqCst)
    }

    fn is_read_locked_by_this_thread(&self) -> bool {
        self.participants
            .existing()
            .is_some_and(|me| me.state() == ReaderState::Read)
    }

    fn is_read_allowed(&self) -> bool {
        self.reads_implicitly() || self.is_read_locked_by_this_thread()
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
