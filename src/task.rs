use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// The error a task may fail with. Carried verbatim in its [`Outcome`].
pub type TaskError = Box<dyn StdError + Send + Sync + 'static>;

/// What a single task produces.
pub type TaskResult<T> = Result<T, TaskError>;

/// A boxed task future, for callers that store heterogeneous tasks before submitting them.
pub type TaskToExecute<T> = Pin<Box<dyn Future<Output = TaskResult<T>> + Send + 'static>>;

/// Placeholder value type for fire-and-forget tasks that produce nothing meaningful.
pub type Void = ();

/// The recorded result of one admitted task.
///
/// `sequence` is the 0-based admission position of the task; outcomes returned by
/// `BoundedExecutor::finalize` are ordered by it with no gaps.
pub struct Outcome<T> {
  pub sequence: usize,
  pub result: TaskResult<T>,
}

impl<T> Outcome<T> {
  pub(crate) fn new(sequence: usize, result: TaskResult<T>) -> Self {
    Self { sequence, result }
  }

  /// The task's value, if it succeeded.
  pub fn value(&self) -> Option<&T> {
    self.result.as_ref().ok()
  }

  /// The task's error, if it failed.
  pub fn error(&self) -> Option<&TaskError> {
    self.result.as_ref().err()
  }

  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }

  pub fn into_result(self) -> TaskResult<T> {
    self.result
  }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("Outcome");
    s.field("sequence", &self.sequence);
    match &self.result {
      Ok(value) => s.field("value", value),
      Err(err) => s.field("error", &format_args!("{}", err)),
    };
    s.finish()
  }
}
