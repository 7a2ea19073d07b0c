use crate::error::PoolError;

use tokio::runtime::Handle as TokioHandle;

/// Construction parameters for a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
  pub worker_count: usize,
  pub name: String,
  /// Runtime the workers are spawned on. Falls back to the runtime that is
  /// current when `run()` is called.
  pub tokio_handle: Option<TokioHandle>,
}

impl PoolConfig {
  pub fn new(worker_count: usize) -> Self {
    Self {
      worker_count,
      name: "worker_pool".to_string(),
      tokio_handle: None,
    }
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn tokio_handle(mut self, handle: TokioHandle) -> Self {
    self.tokio_handle = Some(handle);
    self
  }

  pub(crate) fn validate(&self) -> Result<(), PoolError> {
    if self.worker_count == 0 {
      return Err(PoolError::InvalidWorkerCount(self.worker_count));
    }
    Ok(())
  }
}
