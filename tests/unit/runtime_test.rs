//! Tests for tokio blocking-pool adapters

use prometheus_read_mostly::core::{
    AnyThreadCoordinator, LockError, ReadWriteCoordinator, WriteThreadCoordinator,
};
use prometheus_read_mostly::config::CoordinatorConfig;
use prometheus_read_mostly::runtime::{spawn_read_action, spawn_write_action};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawn_read_and_write_actions() {
    let lock = Arc::new(AnyThreadCoordinator::with_defaults());

    let written = spawn_write_action(Arc::clone(&lock), || 1 + 1).await.unwrap();
    assert_eq!(written, 2);

    let remote = Arc::clone(&lock);
    let read = spawn_read_action(Arc::clone(&lock), move || remote.is_read_locked_by_this_thread())
        .await
        .unwrap();
    assert!(read);
    assert!(!lock.is_write_locked());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawn_write_action_off_write_thread_fails() {
    let lock: Arc<dyn ReadWriteCoordinator> =
        Arc::new(WriteThreadCoordinator::new(CoordinatorConfig::default()).unwrap());

    let err = spawn_write_action(lock, || ()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LockError>(),
        Some(LockError::WrongThread { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_action_surfaces_as_error() {
    let lock = Arc::new(AnyThreadCoordinator::with_defaults());
    let err = spawn_read_action(Arc::clone(&lock), || panic!("boom"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("read action task failed"));
}
