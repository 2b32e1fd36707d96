//! Builder wiring configuration, cancellation and diagnostics into a coordinator.

use std::sync::Arc;
use std::thread::{self, Thread};

use crate::config::{CoordinatorConfig, ThreadingMode};
use crate::core::{
    AnyThreadCoordinator, CancellationCheck, LockError, LockEventSink, NeverCanceled,
    ReadWriteCoordinator, WriteThreadCoordinator,
};

type Parts = (
    CoordinatorConfig,
    Arc<dyn CancellationCheck>,
    Option<Arc<dyn LockEventSink>>,
    Option<Thread>,
);

/// Builds either coordinator from one configuration.
///
/// ```
/// use prometheus_read_mostly::builders::CoordinatorBuilder;
/// use prometheus_read_mostly::config::{CoordinatorConfig, ThreadingMode};
/// use prometheus_read_mostly::core::ReadWriteCoordinator;
///
/// let lock = CoordinatorBuilder::new(
///     CoordinatorConfig::new().with_mode(ThreadingMode::WriteThread),
/// )
/// .build()
/// .unwrap();
/// assert!(lock.is_read_allowed());
/// ```
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    cancellation: Option<Arc<dyn CancellationCheck>>,
    events: Option<Arc<dyn LockEventSink>>,
    write_thread: Option<Thread>,
}

impl CoordinatorBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            cancellation: None,
            events: None,
            write_thread: None,
        }
    }

    /// Configuration the builder will apply.
    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Cancellation source polled by blocked readers.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Arc<dyn CancellationCheck>) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Sink receiving park, wake-up and sweep events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn LockEventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Write thread for [`ThreadingMode::WriteThread`]; defaults to the
    /// thread calling `build`.
    #[must_use]
    pub fn with_write_thread(mut self, write_thread: Thread) -> Self {
        self.write_thread = Some(write_thread);
        self
    }

    fn parts(self) -> Parts {
        let cancellation = self
            .cancellation
            .unwrap_or_else(|| Arc::new(NeverCanceled) as Arc<dyn CancellationCheck>);
        (self.config, cancellation, self.events, self.write_thread)
    }

    /// Build an [`AnyThreadCoordinator`] regardless of the configured mode.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidConfig`] if the configuration fails validation.
    pub fn build_any_thread(self) -> Result<AnyThreadCoordinator, LockError> {
        self.config.validate().map_err(LockError::InvalidConfig)?;
        let (config, cancellation, events, _) = self.parts();
        Ok(AnyThreadCoordinator::from_parts(config, cancellation, events))
    }

    /// Build a [`WriteThreadCoordinator`] regardless of the configured mode.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidConfig`] if the configuration fails validation.
    pub fn build_write_thread(self) -> Result<WriteThreadCoordinator, LockError> {
        self.config.validate().map_err(LockError::InvalidConfig)?;
        let (config, cancellation, events, write_thread) = self.parts();
        let write_thread = write_thread.unwrap_or_else(thread::current);
        Ok(WriteThreadCoordinator::from_parts(
            config,
            write_thread,
            cancellation,
            events,
        ))
    }

    /// Build the coordinator selected by the configured [`ThreadingMode`].
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidConfig`] if the configuration fails validation.
    pub fn build(self) -> Result<Arc<dyn ReadWriteCoordinator>, LockError> {
        match self.config.mode {
            ThreadingMode::AnyThread => Ok(Arc::new(self.build_any_thread()?)),
            ThreadingMode::WriteThread => Ok(Arc::new(self.build_write_thread()?)),
        }
    }
}
