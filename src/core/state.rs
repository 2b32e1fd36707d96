//! Reader states, write progress, and the tokens handed out by read acquisition.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::record::ReaderRecord;

/// State of a single participant thread with respect to one coordinator.
///
/// Only the owning thread moves its own record between states; other threads
/// only observe it (the writer's "all readers idle" scan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ReaderState {
    /// Holds nothing.
    Calm = 0,
    /// Holds a read lock.
    Read = 1,
    /// Parked, waiting for a writer to go away before reading.
    ReadRequested = 2,
    /// Holds (or is waiting for) write-intent.
    WriteIntent = 3,
    /// Holds (or is waiting for) the write lock.
    Write = 4,
}

impl ReaderState {
    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Read,
            2 => Self::ReadRequested,
            3 => Self::WriteIntent,
            4 => Self::Write,
            _ => Self::Calm,
        }
    }

    /// Whether this state competes for the exclusive owner slot.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Self::WriteIntent | Self::Write)
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Calm => "CALM",
            Self::Read => "READ",
            Self::ReadRequested => "READ_REQ",
            Self::WriteIntent => "WRITE_INTENT",
            Self::Write => "WRITE",
        };
        f.write_str(name)
    }
}

/// Progress of the designated write thread towards exclusive access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WriteState {
    /// No write requested.
    Initial = 0,
    /// Write requested; readers are draining.
    WriteRequested = 1,
    /// All readers drained; the writer runs.
    WriteAcquired = 2,
}

impl WriteState {
    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::WriteRequested,
            2 => Self::WriteAcquired,
            _ => Self::Initial,
        }
    }
}

/// Proof that the current thread acquired a read lock.
///
/// Hand it back to `end_read` on the same thread. The token is neither `Send`
/// nor `Sync`, so it cannot leave the thread that took the lock.
#[derive(Debug)]
#[must_use = "a read lock stays held until the token is passed to `end_read`"]
pub struct ReadToken {
    pub(crate) record: Arc<ReaderRecord>,
    _not_send: PhantomData<*const ()>,
}

impl ReadToken {
    pub(crate) const fn new(record: Arc<ReaderRecord>) -> Self {
        Self {
            record,
            _not_send: PhantomData,
        }
    }

    /// Identifier of the participant record holding the lock.
    #[must_use]
    pub fn record_id(&self) -> u64 {
        self.record.id()
    }
}

/// Outcome of a single non-blocking read attempt.
#[derive(Debug)]
pub enum TryRead {
    /// The thread already reads (explicitly or implicitly); nothing to release.
    AlreadyHeld,
    /// The read lock was taken; release it with `end_read`.
    Acquired(ReadToken),
    /// A writer is active or pending.
    Failed,
}

impl TryRead {
    /// Whether the calling thread may read after this attempt.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// Converts into the token shape accepted by `end_read`.
    ///
    /// Returns `None` for [`TryRead::Failed`].
    #[must_use]
    pub fn into_token(self) -> Option<Option<ReadToken>> {
        match self {
            Self::AlreadyHeld => Some(None),
            Self::Acquired(token) => Some(Some(token)),
            Self::Failed => None,
        }
    }
}
