//! Running lock-protected closures from async code.
//!
//! Locks are bound to OS threads, and a tokio task may hop between workers at
//! every `.await`. These helpers move the whole acquire/run/release sequence
//! onto tokio's blocking pool so it stays on one thread and never stalls an
//! async worker while parked.

use std::sync::Arc;

use anyhow::Context;

use crate::core::{AppResult, CoordinatorExt, ReadWriteCoordinator};

/// Run `action` under a read lock on tokio's blocking pool.
///
/// # Errors
///
/// Fails if the lock refuses the read (cancellation, impatient abort,
/// protocol violation) or if the blocking task panics.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::sync::Arc;
/// use prometheus_read_mostly::core::AnyThreadCoordinator;
/// use prometheus_read_mostly::runtime::spawn_read_action;
///
/// let lock = Arc::new(AnyThreadCoordinator::with_defaults());
/// let answer = spawn_read_action(lock, || 6 * 7).await.unwrap();
/// assert_eq!(answer, 42);
/// # }
/// ```
pub async fn spawn_read_action<C, F, R>(coordinator: Arc<C>, action: F) -> AppResult<R>
where
    C: ReadWriteCoordinator + ?Sized + 'static,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || coordinator.run_read(action))
        .await
        .context("read action task failed")?;
    Ok(outcome?)
}

/// Run `action` under the write lock on tokio's blocking pool.
///
/// With a [`WriteThreadCoordinator`](crate::core::WriteThreadCoordinator) this
/// fails with [`LockError::WrongThread`](crate::core::LockError::WrongThread),
/// since blocking-pool threads are never the write thread.
///
/// # Errors
///
/// Fails if the lock refuses the write or if the blocking task panics.
pub async fn spawn_write_action<C, F, R>(coordinator: Arc<C>, action: F) -> AppResult<R>
where
    C: ReadWriteCoordinator + ?Sized + 'static,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || coordinator.run_write(action))
        .await
        .context("write action task failed")?;
    Ok(outcome?)
}
