//! strand-core
//!
//! Async coordination building blocks: a strictly-ordered task queue, a
//! broadcast event channel, and a cursor-driven page fetcher.
//!
//! Modules:
//! - **queue**: sequenced task queue (FIFO, one task at a time, failure isolating)
//! - **channel**: named broadcast channel with serialized payloads
//! - **pager**: incremental fetching from a cursor-paged source
//! - **task**: boxed task shapes the queue stores and runs
//! - **ids**: ULID-based task identifiers
//! - **error**: task failure type
//! - **observability**: queue status snapshots

pub mod channel;
pub mod error;
pub mod ids;
pub mod observability;
pub mod pager;
pub mod queue;
pub mod task;
