use crate::error::PoolError;
use crate::signal::CancelSignal;

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Bounds how many admitted tasks may run at once.
///
/// A ceiling of `0` builds an open gate that admits every caller immediately.
/// Closing the gate turns away current and future waiters with `PoolStopped`.
#[derive(Debug)]
pub(crate) struct AdmissionGate {
  semaphore: Option<Arc<Semaphore>>,
  capacity: usize,
}

/// Held by an admitted task for as long as it runs. Dropping it frees the slot.
#[derive(Debug)]
pub(crate) struct AdmissionPermit {
  _permit: Option<OwnedSemaphorePermit>,
}

impl AdmissionGate {
  pub(crate) fn new(max_concurrency: usize) -> Self {
    let capacity = max_concurrency.min(Semaphore::MAX_PERMITS);
    let semaphore = match capacity {
      0 => None,
      n => Some(Arc::new(Semaphore::new(n))),
    };
    Self { semaphore, capacity }
  }

  /// The ceiling, or `None` for an open gate.
  pub(crate) fn ceiling(&self) -> Option<usize> {
    self.semaphore.as_ref().map(|_| self.capacity)
  }

  pub(crate) fn available_permits(&self) -> Option<usize> {
    self.semaphore.as_ref().map(|s| s.available_permits())
  }

  /// Wakes every caller blocked in [`acquire`](Self::acquire) with `PoolStopped`.
  /// Permits already handed out stay valid until dropped.
  pub(crate) fn close(&self) {
    if let Some(semaphore) = &self.semaphore {
      semaphore.close();
    }
  }

  /// Takes a permit, waiting until one frees up or `signal` fires.
  ///
  /// A permit that is immediately available is always granted, even if the
  /// signal has already fired. A cancelled wait consumes nothing.
  pub(crate) async fn acquire(&self, signal: &CancelSignal) -> Result<AdmissionPermit, PoolError> {
    let Some(semaphore) = &self.semaphore else {
      return Ok(AdmissionPermit { _permit: None });
    };

    match semaphore.clone().try_acquire_owned() {
      Ok(permit) => return Ok(AdmissionPermit { _permit: Some(permit) }),
      Err(TryAcquireError::Closed) => return Err(PoolError::PoolStopped),
      Err(TryAcquireError::NoPermits) => {}
    }

    if let Some(reason) = signal.reason() {
      return Err(reason.into());
    }

    tokio::select! {
      biased;
      reason = signal.fired() => Err(reason.into()),
      acquired = semaphore.clone().acquire_owned() => match acquired {
        Ok(permit) => Ok(AdmissionPermit { _permit: Some(permit) }),
        Err(_) => Err(PoolError::PoolStopped),
      },
    }
  }
}
