use crate::error::{ExecutionError, PoolError};
use crate::state::{Lifecycle, PoolState};

use std::sync::Arc;

use parking_lot::Mutex;

/// One failed task execution.
#[derive(Debug)]
pub struct TaskFailure {
  pub task_id: u64,
  pub worker_id: usize,
  pub error: ExecutionError,
}

/// Failure list shared by all workers. Guarded by its own lock, never by the
/// task-facing shared lock.
pub(crate) type FailureLog = Arc<Mutex<Vec<TaskFailure>>>;

/// Handle to the failures collected by a pool's workers, returned by
/// [`WorkerPool::run`](crate::WorkerPool::run).
///
/// Workers append to the collection while they run, so it only becomes
/// readable once [`WorkerPool::close`](crate::WorkerPool::close) has returned.
/// Reading earlier yields [`PoolError::NotDrained`].
#[derive(Debug, Clone)]
pub struct RunReport {
  pool_name: Arc<String>,
  failures: FailureLog,
  lifecycle: Arc<Lifecycle>,
}

impl RunReport {
  pub(crate) fn new(pool_name: Arc<String>, failures: FailureLog, lifecycle: Arc<Lifecycle>) -> Self {
    Self {
      pool_name,
      failures,
      lifecycle,
    }
  }

  /// Returns `true` once every worker has exited.
  pub fn is_drained(&self) -> bool {
    self.lifecycle.get() == PoolState::Drained
  }

  pub fn failure_count(&self) -> Result<usize, PoolError> {
    self.ensure_drained()?;
    Ok(self.failures.lock().len())
  }

  /// Moves the collected failures out of the report. Later calls return what
  /// is left, which is an empty list.
  pub fn take_failures(&self) -> Result<Vec<TaskFailure>, PoolError> {
    self.ensure_drained()?;
    let failures = std::mem::take(&mut *self.failures.lock());
    tracing::debug!(pool_name = %self.pool_name, count = failures.len(), "Failures taken from run report.");
    Ok(failures)
  }

  fn ensure_drained(&self) -> Result<(), PoolError> {
    if self.is_drained() {
      Ok(())
    } else {
      tracing::warn!(pool_name = %self.pool_name, state = %self.lifecycle.get(), "Run report read before the pool was drained.");
      Err(PoolError::NotDrained)
    }
  }
}
