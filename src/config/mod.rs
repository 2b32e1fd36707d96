//! Configuration models for coordinators.

pub mod coordinator;

pub use coordinator::{CoordinatorConfig, ThreadingMode};
