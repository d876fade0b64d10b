use crate::signal::CancelReason;

use thiserror::Error;

/// Errors that can occur within the `bounded_executor` pool.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
  #[error("Pool has been finalized and no longer accepts submissions")]
  PoolStopped,

  #[error("Submission was cancelled while waiting for admission")]
  Cancelled,

  #[error("Submission deadline exceeded while waiting for admission")]
  DeadlineExceeded,

  #[error("Submitted task panicked")]
  TaskPanicked,

  #[error("Task was dropped before it produced an outcome")]
  TaskAborted,
}

impl From<CancelReason> for PoolError {
  fn from(reason: CancelReason) -> Self {
    match reason {
      CancelReason::Cancelled => PoolError::Cancelled,
      CancelReason::DeadlineExceeded => PoolError::DeadlineExceeded,
    }
  }
}
