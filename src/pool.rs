use crate::config::PoolConfig;
use crate::error::{ExecutionError, PoolError};
use crate::report::{FailureLog, RunReport, TaskFailure};
use crate::state::{Lifecycle, PoolState};
use crate::task::{QueuedTask, SharedLock, Task};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// A fixed-size pool of workers consuming tasks from a bounded queue.
///
/// Usage follows a single pass: [`run`](Self::run) starts the workers,
/// [`submit`](Self::submit) enqueues tasks, [`close`](Self::close) stops
/// submissions and waits until every queued task has executed. A pool is not
/// reusable after `close`.
///
/// `S` is the state guarded by the shared lock handed to every task.
pub struct WorkerPool<S: Send + 'static = ()> {
  pool_name: Arc<String>,
  worker_count: usize,
  tokio_handle: Option<TokioHandle>,
  shared: SharedLock<S>,
  queue_tx: Mutex<Option<mpsc::Sender<QueuedTask<S>>>>,
  // Taken by `run`; `Some` means the workers were never started.
  queue_rx: Mutex<Option<mpsc::Receiver<QueuedTask<S>>>>,
  queued_tasks: Arc<AtomicUsize>,
  // worker_id -> task_id currently executing on that worker.
  active_tasks: Arc<DashMap<usize, u64>>,
  next_task_id: AtomicU64,
  failures: FailureLog,
  lifecycle: Arc<Lifecycle>,
}

impl<S: Send + Default + 'static> WorkerPool<S> {
  /// Creates a pool of `worker_count` workers sharing `S::default()`.
  pub fn new(worker_count: usize) -> Result<Self, PoolError> {
    Self::with_shared(worker_count, S::default())
  }
}

impl<S: Send + 'static> WorkerPool<S> {
  pub fn with_shared(worker_count: usize, shared: S) -> Result<Self, PoolError> {
    Self::with_config(PoolConfig::new(worker_count), shared)
  }

  pub fn with_config(config: PoolConfig, shared: S) -> Result<Self, PoolError> {
    if let Err(e) = config.validate() {
      error!(pool_name = %config.name, "Rejected pool configuration: {}", e);
      return Err(e);
    }

    let (tx, rx) = mpsc::channel(config.worker_count);
    debug!(pool_name = %config.name, worker_count = config.worker_count, "Pool created.");

    Ok(Self {
      pool_name: Arc::new(config.name),
      worker_count: config.worker_count,
      tokio_handle: config.tokio_handle,
      shared: Arc::new(AsyncMutex::new(shared)),
      queue_tx: Mutex::new(Some(tx)),
      queue_rx: Mutex::new(Some(rx)),
      queued_tasks: Arc::new(AtomicUsize::new(0)),
      active_tasks: Arc::new(DashMap::new()),
      next_task_id: AtomicU64::new(0),
      failures: Arc::new(Mutex::new(Vec::new())),
      lifecycle: Arc::new(Lifecycle::new(TaskTracker::new())),
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  pub fn state(&self) -> PoolState {
    self.lifecycle.get()
  }

  /// Number of accepted tasks no worker has picked up yet.
  pub fn queued_task_count(&self) -> usize {
    self.queued_tasks.load(AtomicOrdering::Acquire)
  }

  /// Number of tasks currently executing.
  pub fn active_task_count(&self) -> usize {
    self.active_tasks.len()
  }

  /// Returns a handle to the lock shared by all tasks.
  pub fn shared(&self) -> SharedLock<S> {
    self.shared.clone()
  }

  /// Enqueues a task and returns its id.
  ///
  /// Waits while the queue is full, which is the pool's only backpressure.
  /// If no worker is consuming (e.g. `run` was never called) a full queue
  /// makes this wait forever.
  ///
  /// # Errors
  /// Returns `PoolError::PoolClosed` once `close` has been called.
  pub async fn submit<T: Task<S>>(&self, task: T) -> Result<u64, PoolError> {
    if self.lifecycle.get() != PoolState::Open {
      warn!(pool_name = %self.pool_name, "Submit: Attempted to submit task to a closed pool.");
      return Err(PoolError::PoolClosed);
    }
    let sender = self.queue_tx.lock().clone();
    let tx = match sender {
      Some(tx) => tx,
      None => {
        warn!(pool_name = %self.pool_name, "Submit: Task queue already closed.");
        return Err(PoolError::PoolClosed);
      }
    };

    // Dropping this future while it waits for a slot leaves nothing behind.
    let permit = match tx.reserve().await {
      Ok(permit) => permit,
      Err(send_error) => {
        error!(
          pool_name = %self.pool_name,
          "Submit: Failed to reserve a queue slot, receiver dropped: {}",
          send_error
        );
        return Err(PoolError::QueueSendChannelClosed);
      }
    };

    let task_id = self.next_task_id.fetch_add(1, AtomicOrdering::Relaxed);
    debug!(pool_name = %self.pool_name, %task_id, "Submitting task to queue.");
    // Counted before sending so a fast worker can never decrement first.
    self.queued_tasks.fetch_add(1, AtomicOrdering::AcqRel);
    permit.send(QueuedTask {
      task_id,
      task: Box::new(task),
    });
    Ok(task_id)
  }

  /// Spawns the workers, ids `0..worker_count`, and returns the report their
  /// failures are collected into.
  ///
  /// Workers run on the runtime handle given in [`PoolConfig`], or on the
  /// current runtime if none was configured.
  pub fn run(&self) -> Result<RunReport, PoolError> {
    if self.lifecycle.get() != PoolState::Open {
      warn!(pool_name = %self.pool_name, "Run: Pool is already closed.");
      return Err(PoolError::PoolClosed);
    }
    let tokio_handle = match self.tokio_handle.clone().or_else(|| TokioHandle::try_current().ok()) {
      Some(handle) => handle,
      None => {
        error!(pool_name = %self.pool_name, "Run: No Tokio runtime configured or current.");
        return Err(PoolError::NoRuntime);
      }
    };
    let rx = match self.queue_rx.lock().take() {
      Some(rx) => rx,
      None => {
        warn!(pool_name = %self.pool_name, "Run: Workers are already running.");
        return Err(PoolError::AlreadyRunning);
      }
    };

    let queue_rx = Arc::new(AsyncMutex::new(rx));
    for worker_id in 0..self.worker_count {
      let worker = Worker {
        worker_id,
        pool_name: self.pool_name.clone(),
        queue_rx: queue_rx.clone(),
        shared: self.shared.clone(),
        queued_tasks: self.queued_tasks.clone(),
        active_tasks: self.active_tasks.clone(),
        failures: self.failures.clone(),
      };
      self.lifecycle.workers().spawn_on(
        worker
          .run_loop()
          .instrument(info_span!("pool_worker", pool_name = %self.pool_name, worker_id)),
        &tokio_handle,
      );
    }
    info!(pool_name = %self.pool_name, worker_count = self.worker_count, "Workers started.");

    Ok(RunReport::new(
      self.pool_name.clone(),
      self.failures.clone(),
      self.lifecycle.clone(),
    ))
  }

  /// Closes the queue and waits until every worker has drained it and exited.
  ///
  /// Every task submitted before this call executes before it returns. There
  /// is no timeout: a task that never finishes blocks `close` forever.
  ///
  /// The pool turns `Drained` as soon as the last worker exits, even if this
  /// future is dropped first. Calling `close` again while the pool is still
  /// `Closing` waits for the remaining workers.
  ///
  /// # Errors
  /// Returns `PoolError::NotRunning` if `run` was never called (the pool stays
  /// open) and `PoolError::AlreadyClosed` once the pool is drained.
  pub async fn close(&self) -> Result<(), PoolError> {
    let never_started = self.queue_rx.lock().is_some();
    if never_started {
      warn!(pool_name = %self.pool_name, "Close: Workers were never started; queued tasks could not run.");
      return Err(PoolError::NotRunning);
    }
    if self.lifecycle.get() == PoolState::Drained {
      info!(pool_name = %self.pool_name, "Close: Pool already drained.");
      return Err(PoolError::AlreadyClosed);
    }

    if self.lifecycle.begin_close().is_ok() {
      info!(pool_name = %self.pool_name, queued = self.queued_task_count(), "Closing task queue.");
      let sender = self.queue_tx.lock().take();
      drop(sender);
      self.lifecycle.workers().close();
    } else {
      info!(pool_name = %self.pool_name, "Close: Already closing, waiting for remaining workers.");
    }

    info!(pool_name = %self.pool_name, "Waiting for workers to drain the queue.");
    self.lifecycle.workers().wait().await;
    self.lifecycle.mark_drained();

    info!(
      pool_name = %self.pool_name,
      failures = self.failures.lock().len(),
      "All workers exited. Pool drained."
    );
    Ok(())
  }
}

impl<S: Send + 'static> fmt::Debug for WorkerPool<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerPool")
      .field("pool_name", &self.pool_name)
      .field("worker_count", &self.worker_count)
      .field("state", &self.lifecycle.get())
      .field("queued_tasks", &self.queued_task_count())
      .field("active_tasks", &self.active_task_count())
      .finish_non_exhaustive()
  }
}

impl<S: Send + 'static> Drop for WorkerPool<S> {
  fn drop(&mut self) {
    if self.lifecycle.begin_close().is_ok() {
      info!(
        pool_name = %*self.pool_name,
        "WorkerPool dropped while open. Closing task queue; running workers finish queued tasks in the background."
      );
      self.queue_tx.get_mut().take();
      self.lifecycle.workers().close();
    } else {
      trace!(pool_name = %*self.pool_name, "Drop: Pool already closed.");
    }
  }
}

/// State owned by one worker loop.
struct Worker<S: Send + 'static> {
  worker_id: usize,
  pool_name: Arc<String>,
  queue_rx: Arc<AsyncMutex<mpsc::Receiver<QueuedTask<S>>>>,
  shared: SharedLock<S>,
  queued_tasks: Arc<AtomicUsize>,
  active_tasks: Arc<DashMap<usize, u64>>,
  failures: FailureLog,
}

impl<S: Send + 'static> Worker<S> {
  async fn run_loop(self) {
    debug!(pool_name = %*self.pool_name, worker_id = self.worker_id, "Worker loop started.");

    loop {
      let next = {
        let mut rx = self.queue_rx.lock().await;
        rx.recv().await
      };
      let Some(QueuedTask { task_id, task }) = next else {
        debug!(pool_name = %*self.pool_name, worker_id = self.worker_id, "Task queue closed and empty. Worker exiting.");
        break;
      };
      self.queued_tasks.fetch_sub(1, AtomicOrdering::AcqRel);
      self.active_tasks.insert(self.worker_id, task_id);
      trace!(pool_name = %*self.pool_name, worker_id = self.worker_id, %task_id, "Dequeued task.");

      let worker_id = self.worker_id;
      let shared = self.shared.clone();
      let outcome = AssertUnwindSafe(async move { task.execute(worker_id, shared).await })
        .catch_unwind()
        .await;
      self.active_tasks.remove(&self.worker_id);

      let error = match outcome {
        Ok(Ok(())) => {
          trace!(pool_name = %*self.pool_name, worker_id, %task_id, "Task executed successfully.");
          None
        }
        Ok(Err(e)) => {
          debug!(pool_name = %*self.pool_name, worker_id, %task_id, "Task returned an error: {}", e);
          Some(ExecutionError::Failed(e))
        }
        Err(payload) => {
          let error = ExecutionError::from_panic(payload);
          error!(pool_name = %*self.pool_name, worker_id, %task_id, "Task panicked during execution: {}", error);
          Some(error)
        }
      };

      if let Some(error) = error {
        self.failures.lock().push(TaskFailure {
          task_id,
          worker_id,
          error,
        });
      }
    }
  }
}
