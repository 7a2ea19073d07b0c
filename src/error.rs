use thiserror::Error;

/// Boxed error type returned by task implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the pool itself when it is used out of order.
#[derive(Error, Debug, PartialEq)]
pub enum PoolError {
  #[error("Worker count must be at least 1, got {0}")]
  InvalidWorkerCount(usize),

  #[error("Pool is closing or closed, cannot accept new tasks")]
  PoolClosed,

  #[error("Pool workers are already running")]
  AlreadyRunning,

  #[error("Pool workers were never started; call run() before close()")]
  NotRunning,

  #[error("Pool has already been closed")]
  AlreadyClosed,

  #[error("Task failures are not readable until close() has returned")]
  NotDrained,

  #[error("No Tokio runtime available to spawn workers on")]
  NoRuntime,

  #[error("Pool's internal task queue (sender side) was closed unexpectedly")]
  QueueSendChannelClosed,
}

/// Why a single task execution failed.
#[derive(Error, Debug)]
pub enum ExecutionError {
  #[error("Task returned an error: {0}")]
  Failed(#[source] BoxError),

  #[error("Task panicked: {0}")]
  Panicked(String),
}

impl ExecutionError {
  /// Builds a `Panicked` error from a `catch_unwind` payload.
  pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_string()
    };
    ExecutionError::Panicked(message)
  }

  pub fn is_panic(&self) -> bool {
    matches!(self, ExecutionError::Panicked(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_panic_payload_messages() {
    let err = ExecutionError::from_panic(Box::new("static message"));
    assert_eq!(err.to_string(), "Task panicked: static message");

    let err = ExecutionError::from_panic(Box::new(String::from("owned message")));
    assert!(err.is_panic());
    assert_eq!(err.to_string(), "Task panicked: owned message");

    let err = ExecutionError::from_panic(Box::new(42u32));
    assert_eq!(err.to_string(), "Task panicked: non-string panic payload");
  }

  #[test]
  fn test_failed_keeps_source() {
    use std::error::Error as _;
    let err = ExecutionError::Failed("boom".into());
    assert!(!err.is_panic());
    assert_eq!(err.to_string(), "Task returned an error: boom");
    assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
  }
}
