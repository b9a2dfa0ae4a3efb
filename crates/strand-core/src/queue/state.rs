//! Queue drain state machine.

use serde::{Deserialize, Serialize};

/// Drain state of a task queue.
///
/// State transitions:
/// - Idle -> Draining (a `start` call claims the queue)
/// - Draining -> Idle (queue emptied, cancellation observed, or cleared)
///
/// Idle is both the initial and the terminal state; a queue can be drained
/// any number of times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    /// No drain in progress. Added tasks wait for the next `start`.
    #[default]
    Idle,

    /// A drain loop is executing tasks one at a time.
    Draining,
}

impl DrainState {
    /// Is the queue between drains?
    pub fn is_idle(self) -> bool {
        matches!(self, DrainState::Idle)
    }

    /// Is a drain loop currently active?
    pub fn is_draining(self) -> bool {
        matches!(self, DrainState::Draining)
    }
}
