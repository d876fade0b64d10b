use crate::error::PoolError;
use crate::task::TaskResult;

use fibre::mpsc::{self, AsyncReceiver, AsyncSender};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Once};
use std::time::SystemTime;
use tokio::runtime::Handle as TokioHandle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, Instrument};

// --- Public Event Structs for Handlers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletionStatus {
  Success,
  /// The task returned an error of its own.
  Failed,
  Panicked,
  /// The task was dropped before it could finish, e.g. by runtime shutdown.
  Aborted,
}

impl<T> From<&TaskResult<T>> for TaskCompletionStatus {
  fn from(result: &TaskResult<T>) -> Self {
    match result {
      Ok(_) => TaskCompletionStatus::Success,
      Err(err) => match err.downcast_ref::<PoolError>() {
        Some(PoolError::TaskPanicked) => TaskCompletionStatus::Panicked,
        Some(PoolError::TaskAborted) => TaskCompletionStatus::Aborted,
        _ => TaskCompletionStatus::Failed,
      },
    }
  }
}

#[derive(Debug, Clone)]
pub struct TaskCompletionInfo {
  /// Admission sequence of the task, i.e. its position in the finalized outcome list.
  pub sequence: usize,
  pub pool_name: Arc<String>,
  pub status: TaskCompletionStatus,
  pub completion_time: SystemTime,
}

#[derive(Debug)]
pub(crate) struct InternalCompletionMessage {
  sequence: usize,
  status: TaskCompletionStatus,
}

type CompletionHandler = Arc<dyn Fn(TaskCompletionInfo) + Send + Sync + 'static>;

struct NotifierInternalState {
  internal_rx_for_init: Option<AsyncReceiver<InternalCompletionMessage>>,
  // `None` until the worker starts, and again once the notifier is closed.
  sender: Option<AsyncSender<InternalCompletionMessage>>,
  pending_sender: Option<AsyncSender<InternalCompletionMessage>>,
  worker_join_handle: Option<JoinHandle<()>>,
}

/// Fans task completions out to user handlers without blocking the tasks.
///
/// The dispatch worker is only started once the first handler is registered;
/// until then completions are not queued at all.
pub(crate) struct CompletionNotifier {
  handlers: Arc<RwLock<Vec<CompletionHandler>>>,
  init_once: Once,
  tokio_handle: TokioHandle,
  pool_name: Arc<String>,
  internal_state: Mutex<NotifierInternalState>,
}

impl fmt::Debug for CompletionNotifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let handler_count = self.handlers.try_read().map_or(0, |guard| guard.len());

    f.debug_struct("CompletionNotifier")
      .field("pool_name", &self.pool_name)
      .field("handler_count", &handler_count)
      .field("initialized", &self.init_once.is_completed())
      .finish_non_exhaustive()
  }
}

impl CompletionNotifier {
  pub(crate) fn new(tokio_handle: TokioHandle, pool_name: Arc<String>) -> Self {
    let (tx, rx) = mpsc::unbounded_async();
    Self {
      handlers: Arc::new(RwLock::new(Vec::new())),
      init_once: Once::new(),
      tokio_handle,
      pool_name,
      internal_state: Mutex::new(NotifierInternalState {
        internal_rx_for_init: Some(rx),
        sender: None,
        pending_sender: Some(tx),
        worker_join_handle: None,
      }),
    }
  }

  fn ensure_worker_initialized(&self) {
    self.init_once.call_once(|| {
      let mut state = self.internal_state.lock();
      let Some(rx) = state.internal_rx_for_init.take() else {
        debug!(pool_name = %*self.pool_name, "Notifier already closed; dispatch worker not started.");
        return;
      };
      info!(pool_name = %*self.pool_name, "First completion handler added. Initializing notification worker.");

      let worker_jh = self.tokio_handle.spawn(
        Self::run_notification_worker_loop(
          rx,
          self.handlers.clone(),
          self.tokio_handle.clone(),
          self.pool_name.clone(),
        )
        .instrument(info_span!("notification_worker_loop", pool_name = %*self.pool_name)),
      );
      state.worker_join_handle = Some(worker_jh);
      state.sender = state.pending_sender.take();
    });
  }

  pub(crate) fn add_handler(&self, handler: impl Fn(TaskCompletionInfo) + Send + Sync + 'static) {
    self.ensure_worker_initialized();

    let mut handlers = self.handlers.write();
    handlers.push(Arc::new(handler));
    info!(pool_name = %*self.pool_name, "Notifier: Added new completion handler. Total handlers: {}", handlers.len());
  }

  fn sender(&self) -> Option<AsyncSender<InternalCompletionMessage>> {
    self.internal_state.lock().sender.clone()
  }

  /// Queues a completion for dispatch. No-op when no handler was ever registered.
  pub(crate) async fn notify(&self, sequence: usize, status: TaskCompletionStatus) {
    let Some(tx) = self.sender() else {
      return;
    };
    if tx.send(InternalCompletionMessage { sequence, status }).await.is_err() {
      trace!(pool_name = %*self.pool_name, sequence, "Notifier: dispatch queue closed, completion dropped.");
    }
  }

  /// Like [`notify`](Self::notify) but usable from synchronous contexts such as `Drop`.
  pub(crate) fn notify_detached(&self, sequence: usize, status: TaskCompletionStatus) {
    let Some(tx) = self.sender() else {
      return;
    };
    self.tokio_handle.spawn(async move {
      let _ = tx.send(InternalCompletionMessage { sequence, status }).await;
    });
  }

  /// Stops accepting completions. The worker exits once in-flight senders are gone.
  pub(crate) fn close(&self) {
    let mut state = self.internal_state.lock();
    state.sender = None;
    state.pending_sender = None;
    state.internal_rx_for_init = None;
  }

  async fn run_notification_worker_loop(
    queue_rx: AsyncReceiver<InternalCompletionMessage>,
    handlers_list_arc: Arc<RwLock<Vec<CompletionHandler>>>,
    tokio_handle_for_spawning_handlers: TokioHandle,
    pool_name: Arc<String>,
  ) {
    info!("Notification worker started. Will process messages until its input queue is closed by all senders.");

    while let Ok(internal_msg) = queue_rx.recv().await {
      trace!(sequence = internal_msg.sequence, "Notification worker: processing message.");

      let handlers = handlers_list_arc.read().clone();
      if handlers.is_empty() {
        continue;
      }

      let public_info = TaskCompletionInfo {
        sequence: internal_msg.sequence,
        pool_name: pool_name.clone(),
        status: internal_msg.status,
        completion_time: SystemTime::now(),
      };

      debug!(sequence = public_info.sequence, "Dispatching notification to {} handlers.", handlers.len());

      for handler in handlers {
        let info = public_info.clone();
        tokio_handle_for_spawning_handlers.spawn(async move {
          let sequence = info.sequence;
          let pool_name = info.pool_name.clone();
          let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(info)));
          if result.is_err() {
            error!(pool_name = %*pool_name, sequence, "A completion handler panicked during execution.");
          }
        });
      }
    }

    info!("Notification worker stopped (input queue fully closed and processed).");
  }

  pub(crate) async fn await_shutdown(&self) {
    let handle_option = self.internal_state.lock().worker_join_handle.take();

    if let Some(handle) = handle_option {
      debug!(pool_name = %*self.pool_name, "Notifier: Waiting for notification worker loop to join.");
      if let Err(e) = handle.await {
        error!(pool_name = %*self.pool_name, "Notifier: Error joining notification worker: {:?}", e);
      }
    } else {
      trace!(pool_name = %*self.pool_name, "Notifier: Worker was not initialized or handle already taken; no join needed.");
    }
  }
}
