//! Task plumbing: the boxed shapes a queue stores and runs.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use crate::error::TaskError;
use crate::ids::TaskId;

/// The future a queued task resolves to once started.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// A deferred task: a factory that is only called when the task's turn comes.
///
/// Boxing the factory (not the future) keeps `add` lazy; side effects in the
/// task body cannot begin before the drain reaches it.
pub(crate) type BoxTask = Box<dyn FnOnce() -> BoxTaskFuture + Send + 'static>;

/// A task as stored in the pending queue.
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) run: BoxTask,
}

/// Best-effort text for a panic payload (`&str` and `String` cover what
/// `panic!` produces; anything else gets a placeholder).
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
