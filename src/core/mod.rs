//! Lock engine: participant registry, reader protocol, and the two coordinators.

pub mod any_thread;
pub(crate) mod backoff;
pub mod cancellation;
pub mod coordinator;
pub mod error;
pub mod events;
mod read_path;
pub mod record;
pub(crate) mod registry;
pub mod state;
pub mod write_thread;

pub use any_thread::AnyThreadCoordinator;
pub use cancellation::{
    in_non_cancelable_section, run_non_cancelable, CancellationCheck, CancellationFlag,
    NeverCanceled,
};
pub use coordinator::{CoordinatorExt, ReadWriteCoordinator};
pub use error::{AppResult, LockError};
pub use events::{
    build_lock_event, InMemoryEventSink, LockEvent, LockEventKind, LockEventSink,
    TracingEventSink,
};
pub use record::ReaderRecord;
pub use state::{ReadToken, ReaderState, TryRead, WriteState};
pub use write_thread::WriteThreadCoordinator;
