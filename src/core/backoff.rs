//! Spin-then-park waiting.
//!
//! Waiters yield the processor for a bounded number of rounds, then park with
//! a short timeout. The timeout is not a caller-visible deadline: it makes the
//! waiter re-poll the lock state even if an unpark was lost between setting
//! the parked flag and the predicate becoming true.

use std::thread;
use std::time::Duration;

/// Backoff state for one acquisition attempt.
#[derive(Debug)]
pub(crate) struct Backoff {
    iteration: u32,
    spin_iterations: u32,
    park_timeout: Duration,
}

impl Backoff {
    pub(crate) const fn new(spin_iterations: u32, park_timeout: Duration) -> Self {
        Self {
            iteration: 0,
            spin_iterations,
            park_timeout,
        }
    }

    /// Whether the next [`Backoff::snooze`] parks instead of yielding.
    pub(crate) const fn should_park(&self) -> bool {
        self.iteration >= self.spin_iterations
    }

    /// Whether the next park is the first one of this attempt.
    pub(crate) const fn is_first_park(&self) -> bool {
        self.iteration == self.spin_iterations
    }

    /// Yields or parks, then advances the round counter.
    pub(crate) fn snooze(&mut self) {
        if self.should_park() {
            thread::park_timeout(self.park_timeout);
        } else {
            thread::yield_now();
        }
        self.iteration = self.iteration.saturating_add(1);
    }

    #[cfg(test)]
    pub(crate) const fn iteration(&self) -> u32 {
        self.iteration
    }
}
