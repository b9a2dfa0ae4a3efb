//! Queue-assigned task identifiers.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier assigned to a task when it is added to a queue.
///
/// ULID-based: time-sortable (the timestamp leads), unique without any
/// coordination, 128-bit. Used for logging and correlation only; the queue
/// never looks tasks up by id.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Generate a fresh id from the current wall clock plus a random suffix.
    pub fn generate() -> Self {
        let timestamp_ms = Utc::now().timestamp_millis() as u64;
        TaskId(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        TaskId(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        TaskId(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
