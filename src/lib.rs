//! A Tokio-based fixed-size worker pool.
//!
//! A pool runs a fixed number of workers that pull tasks from a bounded queue
//! until the queue is closed and drained. Every task receives its worker id and
//! a handle to a lock shared by all tasks. Task failures are collected and
//! become readable once `close` has returned.

mod config;
mod error;
mod pool;
mod report;
mod state;
mod task;

pub use config::PoolConfig;
pub use error::{BoxError, ExecutionError, PoolError};
pub use pool::WorkerPool;
pub use report::{RunReport, TaskFailure};
pub use state::PoolState;
pub use task::{task_fn, SharedLock, Task, TaskFn, TaskFuture, TaskResult};
