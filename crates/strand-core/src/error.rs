use thiserror::Error;

/// Failure of a single queued task.
///
/// The drain loop catches and logs these; they are never propagated to the
/// caller of `start` and never retried.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Failure from a plain message.
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }

    /// Failure from any displayable error (handy with `map_err`).
    pub fn from_err(err: impl std::fmt::Display) -> Self {
        TaskError::Failed(err.to_string())
    }
}
