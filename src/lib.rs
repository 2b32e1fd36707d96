//! # Prometheus Read-Mostly
//!
//! Read/write coordination for data that is read constantly and written
//! rarely, where a pending writer must never starve behind a stream of
//! readers.
//!
//! Readers pay almost nothing on the fast path: each thread publishes its
//! state in its own [`ReaderRecord`](core::ReaderRecord) and checks a single
//! "writer pending" flag. Writers announce themselves first, wait for every
//! published reader to leave, and are woken ahead of parked readers when the
//! lock frees up.
//!
//! ## Two coordinators
//!
//! - [`WriteThreadCoordinator`](core::WriteThreadCoordinator): writes are
//!   pinned to one designated thread (an event loop or UI thread). Reads made
//!   on that thread while it writes, or intends to, succeed implicitly.
//! - [`AnyThreadCoordinator`](core::AnyThreadCoordinator): any thread may
//!   take the write intent or write lock; exclusive ownership is claimed
//!   atomically.
//!
//! Both implement [`ReadWriteCoordinator`](core::ReadWriteCoordinator) and
//! support write-intent (upgradeable) locks, suspending a write to let other
//! threads read, and "impatient" reads that abort instead of waiting for a
//! writer.
//!
//! ## Quick start
//!
//! ```rust
//! use prometheus_read_mostly::core::{AnyThreadCoordinator, CoordinatorExt};
//!
//! let lock = AnyThreadCoordinator::with_defaults();
//! let value = lock.run_read(|| 7).unwrap();
//! assert_eq!(value, 7);
//!
//! lock.run_write(|| { /* mutate shared data */ }).unwrap();
//! ```
//!
//! Locks are tied to OS threads. From async code, use the helpers in
//! `runtime` (feature `tokio-runtime`), which run the locked closure on
//! tokio's blocking pool.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Lock engine: states, participant registry and the coordinators.
pub mod core;
/// Configuration models for coordinators.
pub mod config;
/// Builders to construct coordinators from configuration.
pub mod builders;
/// Runtime adapters for async callers.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::CoordinatorBuilder;
pub use crate::config::{CoordinatorConfig, ThreadingMode};
pub use crate::core::{
    AnyThreadCoordinator, CoordinatorExt, LockError, ReadToken, ReadWriteCoordinator,
    WriteThreadCoordinator,
};
