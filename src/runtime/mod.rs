//! Local stand-in for the distributed execution substrate
//!
//! The propagation protocol only needs a handful of things from the platform
//! it runs on, and this module provides them in-process:
//!
//! - `store` - round-numbered directories of partition files and manifests
//! - `partition` - stable hash partitioning of node ids
//! - `pool` - bounded-parallel partition tasks with a barrier at the end
//! - `retry` - per-task retry budget with backoff
//! - `error` - task, store, and round failure types

pub mod error;
pub mod partition;
pub mod pool;
pub mod retry;
pub mod store;

pub use error::{RoundError, StoreError, TaskError, TaskPhase};
pub use partition::Partitioner;
pub use pool::TaskPool;
pub use retry::{BackoffStrategy, RetryExhausted, RetryPolicy};
pub use store::{RoundManifest, RoundStore};
