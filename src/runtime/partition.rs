//! Hash partitioning of node ids

use crate::graph::NodeId;

/// Assigns node ids to a fixed number of partitions.
///
/// The assignment only depends on the id and the partition count, so every
/// round routes a node to the same partition index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    partitions: usize,
}

impl Partitioner {
    /// A zero count is clamped to one partition.
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn partition(&self, id: NodeId) -> usize {
        // Reinterpret the bits so negative ids spread like positive ones.
        (id as u32 as usize) % self.partitions
    }

    /// Route keyed items into per-partition buckets, keeping input order
    /// inside each bucket.
    pub fn split<T>(&self, items: impl IntoIterator<Item = (NodeId, T)>) -> Vec<Vec<(NodeId, T)>> {
        let mut buckets: Vec<Vec<(NodeId, T)>> = (0..self.partitions).map(|_| Vec::new()).collect();
        for (id, item) in items {
            buckets[self.partition(id)].push((id, item));
        }
        buckets
    }
}
