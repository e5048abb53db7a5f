//! Reduce side of a propagation round

use super::proposal::Proposal;
use crate::graph::{Distance, NodeId, NodeRecord};
use thiserror::Error;

/// A reduce group that cannot be turned into exactly one record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("node {node} received {candidates} candidate(s) but no record of its own")]
    MissingStructure { node: NodeId, candidates: usize },

    #[error("node {node} received more than one record of its own")]
    DuplicateStructure { node: NodeId },
}

/// New record for a node plus whether its distance moved this round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduced {
    pub record: NodeRecord,
    pub changed: bool,
}

/// Fold every proposal for `node` into its next record.
///
/// The proposals are consumed in a single pass and in any order; the result
/// is the minimum distance seen, with the adjacency taken verbatim from the
/// node's own record. Because the node's previous distance is part of the
/// minimum, the new distance is never larger than the old one.
pub fn reduce_node<I>(node: NodeId, proposals: I) -> Result<Reduced, ReduceError>
where
    I: IntoIterator<Item = Proposal>,
{
    let mut best = Distance::UNREACHED;
    let mut structure: Option<NodeRecord> = None;
    let mut candidates = 0;

    for proposal in proposals {
        best = best.min(proposal.distance());
        match proposal {
            Proposal::Candidate(_) => candidates += 1,
            Proposal::Structure(record) => {
                if structure.is_some() {
                    return Err(ReduceError::DuplicateStructure { node });
                }
                structure = Some(record);
            }
        }
    }

    let previous = structure.ok_or(ReduceError::MissingStructure { node, candidates })?;
    let changed = best != previous.distance;

    Ok(Reduced {
        record: NodeRecord {
            distance: best,
            ..previous
        },
        changed,
    })
}
