//! External cancellation for blocked readers.
//!
//! A reader waiting for a writer polls a [`CancellationCheck`] once per retry.
//! Writers never poll it: once a write acquisition starts it runs to the end.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    static NON_CANCELABLE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Source of the "stop waiting" signal for blocked readers.
pub trait CancellationCheck: Send + Sync {
    /// Whether the current operation was canceled.
    fn is_canceled(&self) -> bool;

    /// Whether the calling thread runs inside a section that must not be
    /// interrupted. Impatient readers do not fail fast inside such a section.
    fn is_in_non_cancelable_section(&self) -> bool {
        in_non_cancelable_section()
    }
}

/// Cancellation source that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCanceled;

impl CancellationCheck for NeverCanceled {
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Shared, resettable cancellation flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationFlag {
    canceled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this flag.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Clear the signal.
    pub fn reset(&self) {
        self.canceled.store(false, Ordering::Release);
    }
}

impl CancellationCheck for CancellationFlag {
    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// Whether the calling thread is inside [`run_non_cancelable`].
#[must_use]
pub fn in_non_cancelable_section() -> bool {
    NON_CANCELABLE_DEPTH.with(|depth| depth.get() > 0)
}

struct DepthGuard;

impl Drop for DepthGuard {
    fn drop(&mut self) {
        NON_CANCELABLE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Runs `f` with the calling thread marked non-cancelable. Nests.
pub fn run_non_cancelable<R>(f: impl FnOnce() -> R) -> R {
    NON_CANCELABLE_DEPTH.with(|depth| depth.set(depth.get().saturating_add(1)));
    let _guard = DepthGuard;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let other = flag.clone();
        assert!(!other.is_canceled());
        flag.cancel();
        assert!(other.is_canceled());
        other.reset();
        assert!(!flag.is_canceled());
    }

    #[test]
    fn test_non_cancelable_nests_and_unwinds() {
        assert!(!in_non_cancelable_section());
        run_non_cancelable(|| {
            run_non_cancelable(|| assert!(NeverCanceled.is_in_non_cancelable_section()));
            assert!(in_non_cancelable_section());
        });
        assert!(!in_non_cancelable_section());

        let result = std::panic::catch_unwind(|| run_non_cancelable(|| panic!("boom")));
        assert!(result.is_err());
        assert!(!in_non_cancelable_section());
    }
}
