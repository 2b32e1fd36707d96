//! Reader side of the protocol, shared by both coordinators.
//!
//! The coordinators differ only in how a pending writer is detected and who
//! gets unparked when a reader leaves; both hand those in here.

use std::sync::Arc;

use tracing::trace;

use super::cancellation::CancellationCheck;
use super::error::LockError;
use super::events::LockEventKind;
use super::record::ReaderRecord;
use super::registry::Participants;
use super::state::{ReadToken, ReaderState, TryRead};
use crate::config::CoordinatorConfig;

pub(crate) struct ReadPath<'a, P>
where
    P: Fn() -> bool,
{
    pub(crate) participants: &'a Participants,
    pub(crate) config: &'a CoordinatorConfig,
    pub(crate) cancellation: &'a dyn CancellationCheck,
    /// True while a writer holds or waits for the write lock.
    pub(crate) writer_pending: P,
}

impl<P> ReadPath<'_, P>
where
    P: Fn() -> bool,
{
    fn check_impatient(&self, me: &ReaderRecord) -> Result<(), LockError> {
        if me.is_impatient()
            && (self.writer_pending)()
            && !self.cancellation.is_in_non_cancelable_section()
        {
            return Err(LockError::ReadCannotProceed);
        }
        Ok(())
    }

    /// Publish READ, then re-check for a writer that slipped in between.
    fn try_lock(&self, me: &ReaderRecord) -> Result<bool, LockError> {
        self.check_impatient(me)?;
        if !(self.writer_pending)() {
            me.set_state(ReaderState::Read);
            if !(self.writer_pending)() {
                return Ok(true);
            }
            me.set_state(ReaderState::Calm);
        }
        Ok(false)
    }

    /// `Ok(true)` when the thread already reads and nothing must be released.
    fn check_entry(&self, me: &ReaderRecord) -> Result<bool, LockError> {
        self.check_impatient(me)?;
        match me.state() {
            ReaderState::Read => Ok(true),
            ReaderState::Calm => Ok(false),
            other => Err(LockError::illegal(other, ReaderState::Read)),
        }
    }

    pub(crate) fn acquire(&self, me: Arc<ReaderRecord>) -> Result<Option<ReadToken>, LockError> {
        if self.check_entry(&me)? {
            return Ok(None);
        }
        if !self.try_lock(&me)? {
            self.wait(&me)?;
        }
        Ok(Some(ReadToken::new(me)))
    }

    pub(crate) fn try_acquire(&self, me: Arc<ReaderRecord>) -> Result<TryRead, LockError> {
        if self.check_entry(&me)? {
            return Ok(TryRead::AlreadyHeld);
        }
        if self.try_lock(&me)? {
            Ok(TryRead::Acquired(ReadToken::new(me)))
        } else {
            Ok(TryRead::Failed)
        }
    }

    fn wait(&self, me: &ReaderRecord) -> Result<(), LockError> {
        let mut backoff = self.config.backoff();
        let mut parked = false;
        loop {
            if self.try_lock(me)? {
                if parked {
                    self.participants.wake_next_reader(me.id());
                }
                return Ok(());
            }
            // Only the caller's own signal is consulted here; nothing that
            // could itself take this lock.
            if self.cancellation.is_canceled() {
                return Err(LockError::Canceled);
            }
            if backoff.should_park() {
                if backoff.is_first_park() {
                    trace!(record_id = me.id(), "reader parking behind writer");
                    self.participants.emit(LockEventKind::ReaderParked, Some(me));
                }
                parked = true;
                me.set_state(ReaderState::ReadRequested);
                me.set_parked(true);
                backoff.snooze();
                me.set_parked(false);
                me.set_state(ReaderState::Calm);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Drops the read lock proven by `token`; the caller wakes any writer.
    pub(crate) fn release(&self, token: &ReadToken) -> Result<(), LockError> {
        let me = self.participants.verify_token(token)?;
        let state = me.state();
        if state != ReaderState::Read {
            return Err(LockError::illegal(state, ReaderState::Calm));
        }
        me.set_state(ReaderState::Calm);
        Ok(())
    }
}

/// Restores the impatient flag when dropped, even during unwinding.
pub(crate) struct ImpatientScope {
    record: Arc<ReaderRecord>,
    previous: bool,
}

impl ImpatientScope {
    pub(crate) fn enter(record: Arc<ReaderRecord>) -> Self {
        let previous = record.replace_impatient(true);
        Self { record, previous }
    }
}

impl Drop for ImpatientScope {
    fn drop(&mut self) {
        self.record.replace_impatient(self.previous);
    }
}
