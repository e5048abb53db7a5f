//! reachmap computes single-source reachability and hop distances over a
//! graph stored as partitioned node records.
//!
//! The computation is a chain of rounds. Each round maps every node record to
//! distance proposals, shuffles them by target node, and reduces each group
//! to the node's next record by taking the minimum distance. Rounds repeat
//! until one of them changes nothing; the converged snapshot is then filtered
//! down to the nodes some source can reach.
//!
//! - [`graph`] - node records, their binary format, and the text loader
//! - [`bfs`] - mapper, reducer, convergence, job state, orchestration,
//!   extraction
//! - [`runtime`] - round store, partitioning, task pool, and retries
//! - [`config`] - job configuration

pub mod app;
pub mod bfs;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod runtime;

pub use error::{ReachError, Result};
