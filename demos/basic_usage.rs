use bounded_executor::{BoundedExecutor, CancelSignal, TaskResult};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn my_task_fn(id: usize, delay_ms: u64) -> TaskResult<String> {
  info!("Task {} starting, will sleep for {}ms", id, delay_ms);
  tokio::time::sleep(Duration::from_millis(delay_ms)).await;
  if id == 3 {
    return Err(format!("Task {} gave up after {}ms", id, delay_ms).into());
  }
  let result = format!("Task {} finished successfully after {}ms", id, delay_ms);
  info!("{}", result);
  Ok(result)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example ---");

  let executor = BoundedExecutor::<String>::new(2, Handle::current(), "basic_pool");

  for i in 0..5 {
    // Later tasks sleep less, so they tend to finish first.
    let sleep_duration: u64 = 1000 - (i as u64 * 200);
    if let Err(e) = executor
      .submit(&CancelSignal::never(), my_task_fn(i, sleep_duration))
      .await
    {
      tracing::error!("Failed to submit task {}: {:?}", i, e);
    }
  }

  info!("All tasks submitted. Finalizing...");
  let outcomes = executor.finalize().await.expect("Pool was already finalized");

  // Outcomes come back in submission order regardless of completion order.
  for outcome in outcomes {
    match outcome.into_result() {
      Ok(result) => info!("Result: {}", result),
      Err(e) => info!("Error: {}", e),
    }
  }
  info!("--- Basic Usage Example End ---");
}
