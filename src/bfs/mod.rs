//! The distance-propagation protocol
//!
//! Each round maps every node record to proposals, shuffles them by target
//! id, and reduces each group to the node's next record by taking the
//! minimum distance. The orchestrator repeats rounds until one changes
//! nothing, and the extractor turns that final snapshot into the set of
//! reachable nodes.

pub mod convergence;
pub mod extractor;
pub mod mapper;
pub mod orchestrator;
pub mod proposal;
pub mod reducer;
pub mod round;
pub mod state;

pub use convergence::{ConvergenceSignal, ConvergenceTracker, PartitionSignal};
pub use extractor::{ExtractSummary, Extractor};
pub use mapper::map_node;
pub use orchestrator::{
    run_single_round, CompletedRun, ConvergedSnapshot, Orchestrator, RoundSummary, RunSummary,
};
pub use proposal::Proposal;
pub use reducer::{reduce_node, ReduceError, Reduced};
pub use round::{LocalRound, RoundExecutor, RoundOutput};
pub use state::{AbortReason, JobState, RoundOutcome, StateError};
