//! Cancellation of the admission wait.
//!
//! A [`CancelSignal`] only governs how long `submit` is willing to wait for a
//! free slot. Once a task is admitted the signal has no effect on it.

use std::future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a [`CancelSignal`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
  /// The attached `CancellationToken` was cancelled.
  Cancelled,
  /// The attached deadline passed.
  DeadlineExceeded,
}

/// A caller-supplied signal that can abort a submission blocked on admission.
///
/// Combines an optional [`CancellationToken`] and an optional deadline. A signal
/// with neither never fires.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
  token: Option<CancellationToken>,
  deadline: Option<Instant>,
}

impl CancelSignal {
  /// A signal that never fires.
  pub fn never() -> Self {
    Self::default()
  }

  pub fn from_token(token: CancellationToken) -> Self {
    Self {
      token: Some(token),
      deadline: None,
    }
  }

  /// A signal that fires `timeout` from now.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self::with_deadline(Instant::now() + timeout)
  }

  pub fn with_deadline(deadline: Instant) -> Self {
    Self {
      token: None,
      deadline: Some(deadline),
    }
  }

  /// Attaches a token, replacing any previously attached one.
  pub fn and_token(mut self, token: CancellationToken) -> Self {
    self.token = Some(token);
    self
  }

  /// Attaches a deadline. If one is already set the earlier of the two wins.
  pub fn and_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(match self.deadline {
      Some(existing) => existing.min(deadline),
      None => deadline,
    });
    self
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Returns the reason if the signal has already fired, without waiting.
  /// Cancellation takes precedence over an expired deadline.
  pub fn reason(&self) -> Option<CancelReason> {
    if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
      return Some(CancelReason::Cancelled);
    }
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
      _ => None,
    }
  }

  /// Resolves once the signal fires.
  pub async fn fired(&self) -> CancelReason {
    match (&self.token, self.deadline) {
      (Some(token), Some(deadline)) => {
        tokio::select! {
          biased;
          _ = token.cancelled() => CancelReason::Cancelled,
          _ = sleep_until(deadline) => CancelReason::DeadlineExceeded,
        }
      }
      (Some(token), None) => {
        token.cancelled().await;
        CancelReason::Cancelled
      }
      (None, Some(deadline)) => {
        sleep_until(deadline).await;
        CancelReason::DeadlineExceeded
      }
      (None, None) => future::pending().await,
    }
  }
}

impl From<CancellationToken> for CancelSignal {
  fn from(token: CancellationToken) -> Self {
    Self::from_token(token)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_timeout_fires_with_deadline_exceeded() {
    let signal = CancelSignal::with_timeout(Duration::from_millis(10));
    assert_eq!(signal.reason(), None);

    let started = Instant::now();
    assert_eq!(signal.fired().await, CancelReason::DeadlineExceeded);
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert_eq!(signal.reason(), Some(CancelReason::DeadlineExceeded));
  }

  #[tokio::test]
  async fn test_token_fires_with_cancelled() {
    let token = CancellationToken::new();
    let signal = CancelSignal::from(token.clone());
    assert_eq!(signal.reason(), None);

    token.cancel();
    assert_eq!(signal.reason(), Some(CancelReason::Cancelled));
    assert_eq!(signal.fired().await, CancelReason::Cancelled);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancellation_beats_expired_deadline() {
    let token = CancellationToken::new();
    token.cancel();
    let signal = CancelSignal::with_deadline(Instant::now()).and_token(token);

    assert_eq!(signal.reason(), Some(CancelReason::Cancelled));
    assert_eq!(signal.fired().await, CancelReason::Cancelled);
  }

  #[tokio::test(start_paused = true)]
  async fn test_and_deadline_keeps_earliest() {
    let now = Instant::now();
    let signal = CancelSignal::with_deadline(now + Duration::from_millis(5))
      .and_deadline(now + Duration::from_millis(50));
    assert_eq!(signal.deadline(), Some(now + Duration::from_millis(5)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_never_does_not_fire() {
    let signal = CancelSignal::never();
    let outcome = tokio::time::timeout(Duration::from_secs(60), signal.fired()).await;
    assert!(outcome.is_err(), "a signal without token or deadline must never fire");
    assert_eq!(signal.reason(), None);
  }
}
