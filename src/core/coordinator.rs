//! The coordinator interface and scoped helpers on top of it.
//!
//! Two implementations exist: [`AnyThreadCoordinator`](super::AnyThreadCoordinator)
//! lets any thread become the writer, and
//! [`WriteThreadCoordinator`](super::WriteThreadCoordinator) pins writing to one
//! designated thread. Pick one at startup from the host's threading model.
//!
//! ```
//! use prometheus_read_mostly::core::{AnyThreadCoordinator, CoordinatorExt, ReadWriteCoordinator};
//!
//! let lock = AnyThreadCoordinator::with_defaults();
//! let seen = lock.run_read(|| 42).unwrap();
//! assert_eq!(seen, 42);
//!
//! lock.run_write(|| assert!(lock.is_write_locked())).unwrap();
//! assert!(!lock.is_write_locked());
//! ```

use super::error::LockError;
use super::state::{ReadToken, ReaderState, TryRead};

/// Read/write coordination between threads.
///
/// The lock is not reentrant. The only exception is reading: a thread that
/// already reads, or holds write or write-intent, gets `Ok(None)` from
/// [`start_read`](Self::start_read) and has nothing to release.
pub trait ReadWriteCoordinator: Send + Sync {
    /// Acquires a read lock, blocking while a writer is active or pending.
    ///
    /// # Errors
    ///
    /// - [`LockError::ReadCannotProceed`] for an impatient reader facing a writer
    /// - [`LockError::Canceled`] if the cancellation signal fired while waiting
    /// - [`LockError::IllegalState`] on protocol violations
    fn start_read(&self) -> Result<Option<ReadToken>, LockError>;

    /// Releases a read lock taken by [`start_read`](Self::start_read).
    ///
    /// # Errors
    ///
    /// [`LockError::ForeignToken`] or [`LockError::IllegalState`] on protocol violations.
    fn end_read(&self, token: Option<ReadToken>) -> Result<(), LockError>;

    /// Attempts a read lock exactly once without blocking.
    ///
    /// # Errors
    ///
    /// As [`start_read`](Self::start_read), minus cancellation while waiting.
    fn start_try_read(&self) -> Result<TryRead, LockError>;

    /// Reserves the right to write later. Blocks other intent holders and
    /// writers, not readers.
    ///
    /// # Errors
    ///
    /// [`LockError::IllegalState`] if the thread reads, writes or already
    /// holds intent.
    fn write_intent_lock(&self) -> Result<(), LockError>;

    /// Releases write-intent.
    ///
    /// # Errors
    ///
    /// [`LockError::IllegalState`] if the thread does not hold intent.
    fn write_intent_unlock(&self) -> Result<(), LockError>;

    /// Acquires the write lock, upgrading from write-intent if held, then
    /// waits for every reader to leave.
    ///
    /// # Errors
    ///
    /// [`LockError::IllegalState`] if the thread reads or already writes.
    fn write_lock(&self) -> Result<(), LockError>;

    /// Releases the write lock and wakes the next waiter, writers first.
    ///
    /// # Errors
    ///
    /// [`LockError::IllegalState`] if the thread does not hold the write lock.
    fn write_unlock(&self) -> Result<(), LockError>;

    /// Releases the write lock, runs `pump`, and takes the write lock back,
    /// even if `pump` panics.
    ///
    /// # Errors
    ///
    /// [`LockError::IllegalState`] if the thread does not hold the write lock,
    /// or if `pump` leaves the thread in a state that blocks re-acquisition.
    fn write_suspend_while_pumping(&self, pump: &mut dyn FnMut()) -> Result<(), LockError>;

    /// Runs `action` with the calling thread's reads set to fail fast rather
    /// than wait for a writer. The previous mode is restored afterwards.
    ///
    /// # Errors
    ///
    /// Implementation-specific thread restrictions.
    fn execute_by_impatient_reader(&self, action: &mut dyn FnMut()) -> Result<(), LockError>;

    /// Whether a writer holds the write lock with all readers drained.
    fn is_write_locked(&self) -> bool;

    /// Whether some thread holds write-intent.
    fn is_write_intent_locked(&self) -> bool;

    /// Whether the calling thread holds an explicit read lock.
    fn is_read_locked_by_this_thread(&self) -> bool;

    /// Whether the calling thread may read right now.
    fn is_read_allowed(&self) -> bool;

    /// Whether the writer is inside [`write_suspend_while_pumping`](Self::write_suspend_while_pumping).
    fn is_write_suspended(&self) -> bool;

    /// Whether the calling thread is inside
    /// [`execute_by_impatient_reader`](Self::execute_by_impatient_reader).
    fn is_in_impatient_reader(&self) -> bool;

    /// Number of registered participant records, dead ones included until swept.
    fn participant_count(&self) -> usize;

    /// Drops the records of exited threads now. Returns how many were removed.
    fn sweep_dead_participants(&self) -> usize;
}

struct ReadRelease<'a, C: ?Sized + ReadWriteCoordinator> {
    coordinator: &'a C,
    token: Option<Option<ReadToken>>,
}

impl<C: ?Sized + ReadWriteCoordinator> ReadRelease<'_, C> {
    fn finish(mut self) -> Result<(), LockError> {
        match self.token.take() {
            Some(token) => self.coordinator.end_read(token),
            None => Ok(()),
        }
    }
}

impl<C: ?Sized + ReadWriteCoordinator> Drop for ReadRelease<'_, C> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            let _ = self.coordinator.end_read(token);
        }
    }
}

/// Which exclusive mode a [`WriteRelease`] gives back.
#[derive(Clone, Copy)]
enum Exclusive {
    Write,
    Intent,
}

struct WriteRelease<'a, C: ?Sized + ReadWriteCoordinator> {
    coordinator: &'a C,
    mode: Exclusive,
    armed: bool,
}

impl<C: ?Sized + ReadWriteCoordinator> WriteRelease<'_, C> {
    fn unlock(&self) -> Result<(), LockError> {
        match self.mode {
            Exclusive::Write => self.coordinator.write_unlock(),
            Exclusive::Intent => match self.coordinator.write_intent_unlock() {
                // An upgrade inside the scope already returned the thread to CALM.
                Err(LockError::IllegalState {
                    current: ReaderState::Calm,
                    ..
                }) => Ok(()),
                other => other,
            },
        }
    }

    fn finish(mut self) -> Result<(), LockError> {
        self.armed = false;
        self.unlock()
    }
}

impl<C: ?Sized + ReadWriteCoordinator> Drop for WriteRelease<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.unlock();
        }
    }
}

/// Scoped acquisition helpers. Every helper releases what it took even if the
/// closure panics.
pub trait CoordinatorExt: ReadWriteCoordinator {
    /// Runs `f` under a read lock.
    ///
    /// # Errors
    ///
    /// Whatever [`start_read`](ReadWriteCoordinator::start_read) or
    /// [`end_read`](ReadWriteCoordinator::end_read) return.
    fn run_read<R>(&self, f: impl FnOnce() -> R) -> Result<R, LockError> {
        let release = ReadRelease {
            coordinator: self,
            token: Some(self.start_read()?),
        };
        let out = f();
        release.finish()?;
        Ok(out)
    }

    /// Runs `f` under a read lock if one is available right now.
    ///
    /// Returns `Ok(None)` when a writer is active or pending.
    ///
    /// # Errors
    ///
    /// Whatever [`start_try_read`](ReadWriteCoordinator::start_try_read) or
    /// [`end_read`](ReadWriteCoordinator::end_read) return.
    fn try_run_read<R>(&self, f: impl FnOnce() -> R) -> Result<Option<R>, LockError> {
        let Some(token) = self.start_try_read()?.into_token() else {
            return Ok(None);
        };
        let release = ReadRelease {
            coordinator: self,
            token: Some(token),
        };
        let out = f();
        release.finish()?;
        Ok(Some(out))
    }

    /// Runs `f` under the write lock.
    ///
    /// # Errors
    ///
    /// Whatever [`write_lock`](ReadWriteCoordinator::write_lock) or
    /// [`write_unlock`](ReadWriteCoordinator::write_unlock) return.
    fn run_write<R>(&self, f: impl FnOnce() -> R) -> Result<R, LockError> {
        self.write_lock()?;
        let release = WriteRelease {
            coordinator: self,
            mode: Exclusive::Write,
            armed: true,
        };
        let out = f();
        release.finish()?;
        Ok(out)
    }

    /// Runs `f` holding write-intent, then releases it.
    ///
    /// `f` may upgrade with [`run_write`](Self::run_write). Releasing the write
    /// lock also gives up the intent, so nothing is left to release then.
    ///
    /// # Errors
    ///
    /// Whatever [`write_intent_lock`](ReadWriteCoordinator::write_intent_lock) or
    /// [`write_intent_unlock`](ReadWriteCoordinator::write_intent_unlock) return.
    fn run_write_intent<R>(&self, f: impl FnOnce() -> R) -> Result<R, LockError> {
        self.write_intent_lock()?;
        let release = WriteRelease {
            coordinator: self,
            mode: Exclusive::Intent,
            armed: true,
        };
        let out = f();
        release.finish()?;
        Ok(out)
    }

    /// Runs `f` as an impatient reader.
    ///
    /// # Errors
    ///
    /// Whatever [`execute_by_impatient_reader`](ReadWriteCoordinator::execute_by_impatient_reader) returns.
    fn run_impatient<R>(&self, f: impl FnOnce() -> R) -> Result<R, LockError> {
        let mut f = Some(f);
        let mut out = None;
        self.execute_by_impatient_reader(&mut || {
            if let Some(f) = f.take() {
                out = Some(f());
            }
        })?;
        Ok(out.unwrap_or_else(|| unreachable!("impatient action runs exactly once")))
    }

    /// Runs `f` with the write lock temporarily released.
    ///
    /// # Errors
    ///
    /// Whatever [`write_suspend_while_pumping`](ReadWriteCoordinator::write_suspend_while_pumping) returns.
    fn suspend_write_while<R>(&self, f: impl FnOnce() -> R) -> Result<R, LockError> {
        let mut f = Some(f);
        let mut out = None;
        self.write_suspend_while_pumping(&mut || {
            if let Some(f) = f.take() {
                out = Some(f());
            }
        })?;
        Ok(out.unwrap_or_else(|| unreachable!("pump runs exactly once")))
    }
}

impl<C: ReadWriteCoordinator + ?Sized> CoordinatorExt for C {}
