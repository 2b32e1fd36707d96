//! Tests for error types

use prometheus_read_mostly::core::{AppResult, LockError, ReaderState};

#[test]
fn test_illegal_state_error() {
    let err = LockError::IllegalState {
        current: ReaderState::Read,
        requested: ReaderState::Write,
    };
    assert_eq!(
        format!("{}", err),
        "illegal lock state transition: READ -> WRITE"
    );
    assert!(err.is_protocol_violation());
    assert!(!err.is_cancellation());
}

#[test]
fn test_wrong_thread_error() {
    let err = LockError::WrongThread {
        expected: "ui".to_string(),
        actual: "worker-3".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "write access is restricted to thread ui, called from worker-3"
    );
    assert!(err.is_protocol_violation());
}

#[test]
fn test_read_cannot_proceed_error() {
    let err = LockError::ReadCannotProceed;
    assert_eq!(
        format!("{}", err),
        "cannot run read action now: a write action is pending"
    );
    assert!(err.is_cancellation());
    assert!(!err.is_protocol_violation());
}

#[test]
fn test_canceled_error() {
    let err = LockError::Canceled;
    assert_eq!(format!("{}", err), "read lock acquisition canceled");
    assert!(err.is_cancellation());
}

#[test]
fn test_invalid_config_error() {
    let err = LockError::InvalidConfig("park_timeout_micros must be greater than 0".into());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: park_timeout_micros must be greater than 0"
    );
    assert!(!err.is_protocol_violation());
    assert!(!err.is_cancellation());
}

#[test]
fn test_lock_error_converts_into_app_result() {
    fn fails() -> AppResult<()> {
        let outcome: Result<(), LockError> = Err(LockError::ForeignToken);
        outcome?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert_eq!(
        err.downcast_ref::<LockError>(),
        Some(&LockError::ForeignToken)
    );
}
