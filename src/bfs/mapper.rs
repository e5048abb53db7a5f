//! Map side of a propagation round

use super::proposal::Proposal;
use crate::graph::{NodeId, NodeRecord};

/// Turn one node record into the proposals it sends this round.
///
/// Every node sends its own record back to itself so the reducer can rebuild
/// it. A reached node additionally offers `distance + 1` to each neighbor,
/// once per adjacency entry; an unreached node offers nothing and waits to be
/// discovered. Depends on nothing but `record`.
pub fn map_node<F>(record: NodeRecord, emit: &mut F)
where
    F: FnMut(NodeId, Proposal),
{
    if record.is_reached() {
        let candidate = record.distance.next_hop();
        for neighbor in &record.adjacency {
            emit(*neighbor, Proposal::Candidate(candidate));
        }
    }
    emit(record.id, Proposal::Structure(record));
}
