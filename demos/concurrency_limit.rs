use bounded_executor::{BoundedExecutor, CancelSignal, Void};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  let concurrency_limit = 2;
  let num_tasks = 5;
  info!("--- Concurrency Limit Example (Limit: {}) ---", concurrency_limit);
  info!(
    "Submitting {} tasks, each takes 1 sec. This should take ~{} secs.",
    num_tasks,
    (num_tasks as f32 / concurrency_limit as f32).ceil()
  );

  let executor = BoundedExecutor::<Void>::new(concurrency_limit, Handle::current(), "concurrency_pool");
  let completed = Arc::new(AtomicUsize::new(0));
  let started = Instant::now();

  for i in 0..num_tasks {
    let completed = completed.clone();
    executor
      .submit(&CancelSignal::never(), async move {
        info!("Task {} starting", i);
        tokio::time::sleep(Duration::from_secs(1)).await;
        completed.fetch_add(1, Ordering::SeqCst);
        info!("Task {} finished", i);
        Ok(())
      })
      .await
      .expect("Pool is open");
    info!("Task {} admitted after {:?}", i, started.elapsed());
  }

  let outcomes = executor.finalize().await.expect("Pool was already finalized");
  info!(
    "{} outcomes, {} tasks completed in {:?}",
    outcomes.len(),
    completed.load(Ordering::SeqCst),
    started.elapsed()
  );
  info!("--- Concurrency Limit Example End ---");
}
