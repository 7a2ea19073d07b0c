use crate::error::BoxError;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The lock handed to every task invocation. It guards the state `S` that tasks
/// share across workers; the pool never acquires it.
pub type SharedLock<S> = Arc<tokio::sync::Mutex<S>>;

/// What a task execution produces.
pub type TaskResult = Result<(), BoxError>;

/// The future returned by [`Task::execute`].
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send + 'static>>;

/// A unit of work consumed exactly once by one worker.
pub trait Task<S>: Send + 'static {
  /// Runs the task on worker `worker_id`. `shared` is the pool's shared lock.
  fn execute(self: Box<Self>, worker_id: usize, shared: SharedLock<S>) -> TaskFuture;
}

/// A [`Task`] backed by a closure. Built with [`task_fn`].
#[derive(Clone)]
pub struct TaskFn<F> {
  f: F,
}

/// Wraps a closure returning a future into a [`Task`].
///
/// ```
/// use worker_pool::{task_fn, SharedLock};
///
/// let task = task_fn(|_worker_id: usize, counter: SharedLock<u64>| async move {
///   *counter.lock().await += 1;
///   Ok(())
/// });
/// # let _ = task;
/// ```
pub fn task_fn<S, F, Fut>(f: F) -> TaskFn<F>
where
  S: Send + 'static,
  F: FnOnce(usize, SharedLock<S>) -> Fut + Send + 'static,
  Fut: Future<Output = TaskResult> + Send + 'static,
{
  TaskFn { f }
}

impl<F> fmt::Debug for TaskFn<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskFn").finish_non_exhaustive()
  }
}

impl<S, F, Fut> Task<S> for TaskFn<F>
where
  S: Send + 'static,
  F: FnOnce(usize, SharedLock<S>) -> Fut + Send + 'static,
  Fut: Future<Output = TaskResult> + Send + 'static,
{
  fn execute(self: Box<Self>, worker_id: usize, shared: SharedLock<S>) -> TaskFuture {
    Box::pin((self.f)(worker_id, shared))
  }
}

/// Internal representation of a task sitting in the pool queue.
pub(crate) struct QueuedTask<S: Send + 'static> {
  pub(crate) task_id: u64,
  pub(crate) task: Box<dyn Task<S>>,
}

impl<S: Send + 'static> fmt::Debug for QueuedTask<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueuedTask")
      .field("task_id", &self.task_id)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Add(u32);

  impl Task<u32> for Add {
    fn execute(self: Box<Self>, _worker_id: usize, shared: SharedLock<u32>) -> TaskFuture {
      Box::pin(async move {
        *shared.lock().await += self.0;
        Ok(())
      })
    }
  }

  #[tokio::test]
  async fn test_struct_task_executes() {
    let shared: SharedLock<u32> = Arc::new(tokio::sync::Mutex::new(1));
    let task: Box<dyn Task<u32>> = Box::new(Add(41));
    task.execute(0, shared.clone()).await.unwrap();
    assert_eq!(*shared.lock().await, 42);
  }

  #[tokio::test]
  async fn test_task_fn_passes_worker_id_and_error() {
    let shared: SharedLock<Vec<usize>> = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let ok: Box<dyn Task<Vec<usize>>> = Box::new(task_fn(|worker_id, seen: SharedLock<Vec<usize>>| async move {
      seen.lock().await.push(worker_id);
      Ok(())
    }));
    ok.execute(7, shared.clone()).await.unwrap();
    assert_eq!(*shared.lock().await, vec![7]);

    let failing: Box<dyn Task<Vec<usize>>> =
      Box::new(task_fn(|_, _: SharedLock<Vec<usize>>| async move { Err("boom".into()) }));
    let err = failing.execute(0, shared).await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
  }
}
