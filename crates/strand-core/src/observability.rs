use serde::{Deserialize, Serialize};

use crate::queue::DrainState;

/// Point-in-time view of a queue, cheap to snapshot and serialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub state: DrainState,
}
