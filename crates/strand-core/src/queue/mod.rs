//! Sequenced task queue: FIFO execution, one task at a time, failure isolation.

mod state;

pub use state::DrainState;

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::TaskError;
use crate::ids::TaskId;
use crate::observability::QueueStatus;
use crate::task::{BoxTask, BoxTaskFuture, QueuedTask, panic_message};

/// State shared by all handles of one queue.
struct Shared {
    /// Tasks waiting to run, head first. Locked only for push/pop/clear,
    /// never across an await.
    pending: Mutex<VecDeque<QueuedTask>>,

    /// Current drain state. A watch channel so a second `start` can wait
    /// for the in-flight drain to release the queue.
    drain_state: watch::Sender<DrainState>,
}

/// A queue of deferred asynchronous tasks, executed strictly one at a time
/// in the order they were added.
///
/// Design intent:
/// - `add` only records the task; nothing runs until `start` is awaited.
/// - One drain loop per queue. A second `start` claims nothing and resolves
///   together with the in-flight drain.
/// - A failing task is logged and skipped; it never aborts the drain.
/// - Handles are cheap to clone and share the same queue, so a running task
///   can `add`, `clear`, or trigger cancellation from inside its own body.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (drain_state, _) = watch::channel(DrainState::Idle);
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(VecDeque::new()),
                drain_state,
            }),
        }
    }

    /// Append a task to the tail of the queue and return the id assigned to
    /// it (used in the failure log).
    ///
    /// The task is a factory: it is not called, and gets no chance to run,
    /// until its turn comes in a drain. Legal at any time, including from
    /// inside a running task.
    pub fn add<F, Fut>(&self, task: F) -> TaskId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let id = TaskId::generate();
        let run: BoxTask = Box::new(move || -> BoxTaskFuture { Box::pin(task()) });
        self.shared
            .pending
            .lock()
            .unwrap()
            .push_back(QueuedTask { id, run });
        id
    }

    /// Drain the queue: pop and await each pending task in FIFO order.
    ///
    /// Resolves once the queue is empty, or promptly after `cancel` is
    /// triggered (checked between tasks, never mid-task), or once `clear()`
    /// has emptied the queue. Tasks added while draining, including from
    /// inside a running task, are picked up before this resolves.
    ///
    /// If a drain is already in flight this call starts no second loop: it
    /// resolves when that drain finishes, and its `cancel` token is ignored
    /// (the token given to the call that claimed the queue governs the run).
    /// Cancellation stops the drain but discards nothing; tasks that never
    /// started stay pending until `clear()` or a later `start`.
    pub async fn start(&self, cancel: CancellationToken) {
        if !self.try_claim_drain() {
            self.drained().await;
            return;
        }
        // Released on every exit path, including this future being dropped.
        let _claim = DrainClaim {
            shared: &self.shared,
        };

        let mut executed = 0usize;
        loop {
            if cancel.is_cancelled() {
                debug!(executed, "drain cancelled");
                return;
            }
            let Some(task) = self.pop_front() else {
                break;
            };

            let fut = (task.run)();
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(task_id = %task.id, %err, "queued task failed");
                }
                Err(payload) => {
                    let err = TaskError::Panicked(panic_message(payload.as_ref()));
                    error!(task_id = %task.id, %err, "queued task failed");
                }
            }
            executed += 1;
        }
        debug!(executed, "drain complete");
    }

    /// Discard every pending task immediately.
    ///
    /// The task currently in flight, if any, is not interrupted; once it
    /// finishes, the drain finds the queue empty and resolves.
    pub fn clear(&self) {
        self.shared.pending.lock().unwrap().clear();
    }

    /// Number of tasks waiting to run (excludes the one in flight).
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    pub fn is_draining(&self) -> bool {
        self.shared.drain_state.borrow().is_draining()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.pending_len(),
            state: *self.shared.drain_state.borrow(),
        }
    }

    /// Claim the drain if the queue is idle. The watch channel serializes
    /// claims, so exactly one concurrent `start` wins.
    fn try_claim_drain(&self) -> bool {
        self.shared.drain_state.send_if_modified(|state| {
            if state.is_idle() {
                *state = DrainState::Draining;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the in-flight drain releases the queue.
    async fn drained(&self) {
        let mut rx = self.shared.drain_state.subscribe();
        // wait_for checks the current value first, so the release cannot be
        // missed between subscribing and waiting.
        let _ = rx.wait_for(|state| state.is_idle()).await;
    }

    fn pop_front(&self) -> Option<QueuedTask> {
        self.shared.pending.lock().unwrap().pop_front()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard owned by the active drain loop.
struct DrainClaim<'a> {
    shared: &'a Shared,
}

impl Drop for DrainClaim<'_> {
    fn drop(&mut self) {
        self.shared.drain_state.send_replace(DrainState::Idle);
    }
}
