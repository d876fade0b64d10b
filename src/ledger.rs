use crate::error::PoolError;
use crate::task::{Outcome, TaskResult};

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Whether the pool still accepts submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
  Open,
  /// Terminal. Reached on the first `finalize`.
  Stopped,
}

struct LedgerState<T> {
  lifecycle: Lifecycle,
  next_sequence: usize,
  // Indexed by sequence number. `None` until the task behind the slot completes.
  slots: Vec<Option<Outcome<T>>>,
}

/// Ordered outcome storage plus the outstanding-task barrier.
///
/// Sequence numbers are dense and handed out under the same lock that guards the
/// lifecycle flag, so no slot can be reserved once the ledger is stopped.
pub(crate) struct OutcomeLedger<T> {
  state: Mutex<LedgerState<T>>,
  outstanding: AtomicUsize,
  drained: Notify,
}

impl<T> OutcomeLedger<T> {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(LedgerState {
        lifecycle: Lifecycle::Open,
        next_sequence: 0,
        slots: Vec::new(),
      }),
      outstanding: AtomicUsize::new(0),
      drained: Notify::new(),
    }
  }

  pub(crate) fn lifecycle(&self) -> Lifecycle {
    self.state.lock().lifecycle
  }

  pub(crate) fn admitted(&self) -> usize {
    self.state.lock().next_sequence
  }

  pub(crate) fn outstanding(&self) -> usize {
    self.outstanding.load(AtomicOrdering::Acquire)
  }

  /// Reserves the next slot and counts one more outstanding task.
  pub(crate) fn reserve(&self) -> Result<usize, PoolError> {
    let mut state = self.state.lock();
    if state.lifecycle == Lifecycle::Stopped {
      return Err(PoolError::PoolStopped);
    }
    let sequence = state.next_sequence;
    state.next_sequence += 1;
    state.slots.push(None);
    self.outstanding.fetch_add(1, AtomicOrdering::AcqRel);
    Ok(sequence)
  }

  /// Writes the outcome for `sequence`. A slot is written at most once; later
  /// writes are ignored and reported as `false`.
  pub(crate) fn fill(&self, sequence: usize, result: TaskResult<T>) -> bool {
    let mut state = self.state.lock();
    match state.slots.get_mut(sequence) {
      Some(slot) if slot.is_none() => {
        *slot = Some(Outcome::new(sequence, result));
        true
      }
      _ => false,
    }
  }

  /// Marks one outstanding task as done, waking the drain waiter on the last one.
  pub(crate) fn complete(&self) {
    if self.outstanding.fetch_sub(1, AtomicOrdering::AcqRel) == 1 {
      self.drained.notify_waiters();
    }
  }

  /// Flips the lifecycle to `Stopped`. Fails if it already was.
  pub(crate) fn stop(&self) -> Result<(), PoolError> {
    let mut state = self.state.lock();
    match state.lifecycle {
      Lifecycle::Stopped => Err(PoolError::PoolStopped),
      Lifecycle::Open => {
        state.lifecycle = Lifecycle::Stopped;
        Ok(())
      }
    }
  }

  /// Waits until no admitted task is outstanding.
  pub(crate) async fn wait_drained(&self) {
    loop {
      let notified = self.drained.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();
      if self.outstanding() == 0 {
        return;
      }
      notified.await;
    }
  }

  /// Takes every recorded outcome in sequence order. Only meaningful once drained.
  pub(crate) fn take_outcomes(&self) -> Vec<Outcome<T>> {
    let slots = std::mem::take(&mut self.state.lock().slots);
    let expected = slots.len();
    let outcomes: Vec<Outcome<T>> = slots.into_iter().flatten().collect();
    debug_assert_eq!(outcomes.len(), expected, "outcome slot left empty after drain");
    outcomes
  }
}
