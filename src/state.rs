use crate::error::PoolError;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::task::TaskTracker;

/// Lifecycle of a pool. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  /// Accepting submissions.
  Open,
  /// Queue closed; workers are draining the remaining tasks.
  Closing,
  /// Every worker has exited.
  Drained,
}

impl PoolState {
  fn as_u8(self) -> u8 {
    match self {
      PoolState::Open => 0,
      PoolState::Closing => 1,
      PoolState::Drained => 2,
    }
  }

  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => PoolState::Open,
      1 => PoolState::Closing,
      _ => PoolState::Drained,
    }
  }
}

impl fmt::Display for PoolState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      PoolState::Open => "open",
      PoolState::Closing => "closing",
      PoolState::Drained => "drained",
    };
    f.write_str(s)
  }
}

/// Pool state shared between the pool and its reports.
///
/// `Closing -> Drained` follows the worker tracker: once it is closed and every
/// worker has exited the pool reads as drained, whether or not anyone is still
/// awaiting `close()`.
#[derive(Debug)]
pub(crate) struct Lifecycle {
  state: AtomicU8,
  workers: TaskTracker,
}

impl Lifecycle {
  pub(crate) fn new(workers: TaskTracker) -> Self {
    Self {
      state: AtomicU8::new(PoolState::Open.as_u8()),
      workers,
    }
  }

  pub(crate) fn workers(&self) -> &TaskTracker {
    &self.workers
  }

  pub(crate) fn get(&self) -> PoolState {
    let state = PoolState::from_u8(self.state.load(Ordering::Acquire));
    if state == PoolState::Closing && self.workers.is_closed() && self.workers.is_empty() {
      self.mark_drained();
      return PoolState::Drained;
    }
    state
  }

  /// `Open -> Closing`. Fails if close was already requested.
  pub(crate) fn begin_close(&self) -> Result<(), PoolError> {
    self
      .state
      .compare_exchange(
        PoolState::Open.as_u8(),
        PoolState::Closing.as_u8(),
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .map(|_| ())
      .map_err(|_| PoolError::AlreadyClosed)
  }

  /// `Closing -> Drained`. Called once every worker has exited.
  pub(crate) fn mark_drained(&self) {
    self.state.store(PoolState::Drained.as_u8(), Ordering::Release);
  }
}
