//! Error types for lock operations.

use thiserror::Error;

use super::state::ReaderState;

/// Errors produced by coordinators.
///
/// Protocol violations are programmer errors and are never retried inside the
/// lock. The two cancellation variants are expected: the caller abandons the
/// read attempt and tries again later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The calling thread requested a state it cannot move to from its current one.
    #[error("illegal lock state transition: {current} -> {requested}")]
    IllegalState {
        /// State the thread was in.
        current: ReaderState,
        /// State it asked for.
        requested: ReaderState,
    },
    /// A write-side operation was attempted off the designated write thread.
    #[error("write access is restricted to thread {expected}, called from {actual}")]
    WrongThread {
        /// The designated write thread.
        expected: String,
        /// The calling thread.
        actual: String,
    },
    /// A read token was handed back on a thread or coordinator that did not issue it.
    #[error("read token was not issued to this thread by this coordinator")]
    ForeignToken,
    /// Impatient read attempted while a write is active or pending.
    #[error("cannot run read action now: a write action is pending")]
    ReadCannotProceed,
    /// The external cancellation signal fired while waiting for a read lock.
    #[error("read lock acquisition canceled")]
    Canceled,
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LockError {
    /// Whether this error is a protocol violation (a bug at the call site).
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::IllegalState { .. } | Self::WrongThread { .. } | Self::ForeignToken
        )
    }

    /// Whether this error means "give up this read attempt and retry later".
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::ReadCannotProceed | Self::Canceled)
    }

    pub(crate) const fn illegal(current: ReaderState, requested: ReaderState) -> Self {
        Self::IllegalState { current, requested }
    }

    pub(crate) fn wrong_thread(expected: &std::thread::Thread) -> Self {
        Self::WrongThread {
            expected: describe_thread(expected),
            actual: describe_thread(&std::thread::current()),
        }
    }
}

fn describe_thread(thread: &std::thread::Thread) -> String {
    match thread.name() {
        Some(name) => format!("{name} ({:?})", thread.id()),
        None => format!("{:?}", thread.id()),
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
