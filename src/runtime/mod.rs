//! Runtime adapters for async hosts.

pub mod tokio_blocking;

pub use tokio_blocking::{spawn_read_action, spawn_write_action};
