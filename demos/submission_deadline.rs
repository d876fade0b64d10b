use bounded_executor::{BoundedExecutor, CancelSignal, PoolError, TaskCompletionInfo};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Submission Deadline Example ---");

  let executor = BoundedExecutor::<usize>::new(2, Handle::current(), "deadline_pool");
  executor.add_completion_handler(|info: TaskCompletionInfo| {
    info!("Handler: task #{} finished with {:?}", info.sequence, info.status);
  });

  // The deadline only bounds the wait for a slot. Admitted tasks run to completion.
  let shutdown = CancellationToken::new();
  let signal = CancelSignal::with_timeout(Duration::from_millis(50)).and_token(shutdown.clone());

  for i in 0..5 {
    match executor
      .submit(&signal, async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(i * 10)
      })
      .await
    {
      Ok(()) => info!("Task {} admitted", i),
      Err(PoolError::DeadlineExceeded) => warn!("Task {} not admitted: no slot within the deadline", i),
      Err(e) => warn!("Task {} not admitted: {}", i, e),
    }
  }

  let outcomes = executor.finalize().await.expect("Pool was already finalized");
  for outcome in &outcomes {
    info!("Outcome #{}: {:?}", outcome.sequence, outcome.value());
  }

  match executor.finalize().await {
    Err(PoolError::PoolStopped) => info!("Second finalize rejected as expected."),
    other => warn!("Unexpected second finalize result: {:?}", other.map(|o| o.len())),
  }
  info!("--- Submission Deadline Example End ---");
}
