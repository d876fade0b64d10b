//! A Tokio-based bounded task executor that runs submitted futures with a fixed
//! concurrency ceiling and returns their outcomes in submission order.

mod error;
mod executor;
mod gate;
mod ledger;
mod notifier;
mod signal;
mod task;

pub use error::PoolError;
pub use executor::BoundedExecutor;
pub use ledger::Lifecycle;
pub use notifier::{TaskCompletionInfo, TaskCompletionStatus};
pub use signal::{CancelReason, CancelSignal};
pub use task::{Outcome, TaskError, TaskResult, TaskToExecute, Void};
