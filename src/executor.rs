use crate::error::PoolError;
use crate::gate::{AdmissionGate, AdmissionPermit};
use crate::ledger::{Lifecycle, OutcomeLedger};
use crate::notifier::{CompletionNotifier, TaskCompletionInfo, TaskCompletionStatus};
use crate::signal::CancelSignal;
use crate::task::{Outcome, TaskResult};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle as TokioHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Runs submitted tasks with bounded parallelism and hands back their outcomes
/// in admission order.
///
/// The pool has two phases. While `Open`, [`submit`](Self::submit) admits work
/// as permits allow. [`finalize`](Self::finalize) flips it to `Stopped` for good,
/// waits for every admitted task and returns one [`Outcome`] per task.
pub struct BoundedExecutor<T: Send + 'static> {
  pool_name: Arc<String>,
  gate: AdmissionGate,
  ledger: Arc<OutcomeLedger<T>>,
  notifier: Arc<CompletionNotifier>,
  tokio_handle: TokioHandle,
}

impl<T: Send + 'static> BoundedExecutor<T> {
  /// Creates a pool running at most `max_concurrency` tasks at once on `tokio_handle`.
  /// A `max_concurrency` of `0` means unbounded.
  pub fn new(max_concurrency: usize, tokio_handle: TokioHandle, pool_name: &str) -> Arc<Self> {
    let pool_name = Arc::new(pool_name.to_string());
    info!(pool_name = %*pool_name, max_concurrency, "Creating bounded executor.");

    Arc::new(Self {
      gate: AdmissionGate::new(max_concurrency),
      ledger: Arc::new(OutcomeLedger::new()),
      notifier: Arc::new(CompletionNotifier::new(tokio_handle.clone(), pool_name.clone())),
      pool_name,
      tokio_handle,
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// The concurrency ceiling, or `None` when unbounded.
  pub fn max_concurrency(&self) -> Option<usize> {
    self.gate.ceiling()
  }

  /// Free admission slots right now, or `None` when unbounded.
  pub fn available_permits(&self) -> Option<usize> {
    self.gate.available_permits()
  }

  /// Number of tasks admitted so far.
  pub fn admitted_count(&self) -> usize {
    self.ledger.admitted()
  }

  /// Number of admitted tasks that have not completed yet.
  pub fn outstanding_count(&self) -> usize {
    self.ledger.outstanding()
  }

  pub fn lifecycle(&self) -> Lifecycle {
    self.ledger.lifecycle()
  }

  pub fn is_stopped(&self) -> bool {
    self.lifecycle() == Lifecycle::Stopped
  }

  /// Registers a handler called once per completed task, after its outcome is recorded.
  /// Handlers run on the pool's runtime; a panicking handler is logged and ignored.
  pub fn add_completion_handler(&self, handler: impl Fn(TaskCompletionInfo) + Send + Sync + 'static) {
    self.notifier.add_handler(handler);
  }

  /// Submits a task, waiting for a free slot if the pool is at its ceiling.
  ///
  /// Returns once the task is admitted and spawned; it never waits for the task
  /// itself. `signal` only bounds the admission wait.
  ///
  /// # Errors
  /// Returns `PoolError::PoolStopped` if the pool has been finalized.
  /// Returns `PoolError::Cancelled` or `PoolError::DeadlineExceeded` if `signal`
  /// fired before a slot freed up. Such a submission leaves no outcome behind.
  pub async fn submit<F>(&self, signal: &CancelSignal, task: F) -> Result<(), PoolError>
  where
    F: Future<Output = TaskResult<T>> + Send + 'static,
  {
    let slot = self.admit(signal).await?;
    self.launch(slot, task);
    Ok(())
  }

  /// Like [`submit`](Self::submit), for synchronous work run on Tokio's blocking pool.
  pub async fn submit_blocking<F>(&self, signal: &CancelSignal, task: F) -> Result<(), PoolError>
  where
    F: FnOnce() -> TaskResult<T> + Send + 'static,
  {
    let slot = self.admit(signal).await?;
    let blocking_handle = self.tokio_handle.clone();
    self.launch(slot, async move {
      match blocking_handle.spawn_blocking(task).await {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => Err(PoolError::TaskPanicked.into()),
        Err(_) => Err(PoolError::TaskAborted.into()),
      }
    });
    Ok(())
  }

  /// Stops the pool, waits for every admitted task and returns their outcomes
  /// ordered by admission sequence.
  ///
  /// Callers still blocked in `submit` are released with `PoolError::PoolStopped`
  /// and leave no outcome behind.
  ///
  /// Task failures are reported per outcome, never through this call. The wait
  /// cannot be abandoned early: dropping the returned future leaves the pool
  /// stopped with its outcomes unreachable.
  ///
  /// # Errors
  /// Returns `PoolError::PoolStopped` if the pool was already finalized.
  pub async fn finalize(&self) -> Result<Vec<Outcome<T>>, PoolError> {
    if let Err(e) = self.ledger.stop() {
      warn!(pool_name = %*self.pool_name, "Finalize: Pool was already finalized.");
      return Err(e);
    }
    self.gate.close();
    info!(
      pool_name = %*self.pool_name,
      admitted = self.ledger.admitted(),
      outstanding = self.ledger.outstanding(),
      "Pool stopped. Waiting for admitted tasks to complete."
    );

    self.ledger.wait_drained().await;

    self.notifier.close();
    self.notifier.await_shutdown().await;

    let outcomes = self.ledger.take_outcomes();
    info!(pool_name = %*self.pool_name, outcomes = outcomes.len(), "Pool drained and finalized.");
    Ok(outcomes)
  }

  async fn admit(&self, signal: &CancelSignal) -> Result<OutcomeSlot<T>, PoolError> {
    if self.ledger.lifecycle() == Lifecycle::Stopped {
      warn!(pool_name = %*self.pool_name, "Submit: Attempted to submit task to a finalized pool.");
      return Err(PoolError::PoolStopped);
    }

    let permit = match self.gate.acquire(signal).await {
      Ok(permit) => permit,
      Err(e) => {
        debug!(pool_name = %*self.pool_name, "Submit: Admission wait ended without a slot: {}", e);
        return Err(e);
      }
    };

    // The pool may have been finalized while this caller waited on the gate.
    let sequence = match self.ledger.reserve() {
      Ok(sequence) => sequence,
      Err(e) => {
        debug!(pool_name = %*self.pool_name, "Submit: Slot granted after pool stopped. Releasing it.");
        return Err(e);
      }
    };
    trace!(pool_name = %*self.pool_name, sequence, available = ?self.gate.available_permits(), "Task admitted.");

    Ok(OutcomeSlot {
      sequence,
      ledger: self.ledger.clone(),
      notifier: self.notifier.clone(),
      permit: Some(permit),
      settled: false,
    })
  }

  fn launch<F>(&self, slot: OutcomeSlot<T>, task: F)
  where
    F: Future<Output = TaskResult<T>> + Send + 'static,
  {
    let sequence = slot.sequence;
    let pool_name = self.pool_name.clone();
    let span = info_span!("bounded_task", pool_name = %*pool_name, sequence);

    self.tokio_handle.spawn(
      async move {
        let result = match AssertUnwindSafe(task).catch_unwind().await {
          Ok(result) => result,
          Err(_panic_payload) => {
            error!(pool_name = %*pool_name, sequence, "Task panicked during execution.");
            Err(PoolError::TaskPanicked.into())
          }
        };
        slot.finish(result).await;
      }
      .instrument(span),
    );
  }
}

impl<T: Send + 'static> Drop for BoundedExecutor<T> {
  fn drop(&mut self) {
    if self.ledger.lifecycle() == Lifecycle::Open && self.ledger.admitted() > 0 {
      warn!(
        pool_name = %*self.pool_name,
        admitted = self.ledger.admitted(),
        outstanding = self.ledger.outstanding(),
        "BoundedExecutor dropped without finalize. Outcomes will be discarded."
      );
    } else {
      trace!(pool_name = %*self.pool_name, "BoundedExecutor dropped.");
    }
  }
}

/// The reserved outcome position of one admitted task, plus the permit it runs under.
///
/// Settling writes the outcome, frees the permit and then counts the task as done.
/// A slot dropped unsettled records `PoolError::TaskAborted` so `finalize` never waits forever.
struct OutcomeSlot<T: Send + 'static> {
  sequence: usize,
  ledger: Arc<OutcomeLedger<T>>,
  notifier: Arc<CompletionNotifier>,
  permit: Option<AdmissionPermit>,
  settled: bool,
}

impl<T: Send + 'static> OutcomeSlot<T> {
  async fn finish(mut self, result: TaskResult<T>) {
    let status = TaskCompletionStatus::from(&result);
    self.ledger.fill(self.sequence, result);
    drop(self.permit.take());
    debug!(sequence = self.sequence, ?status, "Task finished, outcome recorded.");

    self.notifier.notify(self.sequence, status).await;
    self.settled = true;
    self.ledger.complete();
  }
}

impl<T: Send + 'static> Drop for OutcomeSlot<T> {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    if self.ledger.fill(self.sequence, Err(PoolError::TaskAborted.into())) {
      warn!(sequence = self.sequence, "Task dropped before completion. Recorded as aborted.");
      self.notifier.notify_detached(self.sequence, TaskCompletionStatus::Aborted);
    }
    drop(self.permit.take());
    self.ledger.complete();
  }
}
