//! Graph encoding: text adjacency lists to the round-0 snapshot
//!
//! Input is one vertex per line, the vertex id followed by its out-neighbors,
//! all separated by whitespace:
//!
//! ```text
//! # id  neighbors...
//! 1     2 4
//! 2     3
//! 5
//! ```
//!
//! Every id that appears anywhere gets a record, so a neighbor that never has
//! a line of its own still exists as a vertex with no out-edges.

use super::record::{NodeId, NodeRecord};
use crate::error::ReachError;
use crate::runtime::partition::Partitioner;
use crate::runtime::store::{self, RoundManifest};
use crate::runtime::StoreError;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("line {line}: invalid node id {token:?}")]
    InvalidNodeId { line: usize, token: String },

    #[error("at least one source node is required")]
    NoSources,
}

/// Parse an adjacency list into round-0 records sorted by id.
///
/// Repeated lines for the same id append to its adjacency in input order.
/// Source ids that never appear in the text become isolated vertices.
pub fn parse_adjacency_list(text: &str, sources: &[NodeId]) -> Result<Vec<NodeRecord>, GraphError> {
    if sources.is_empty() {
        return Err(GraphError::NoSources);
    }

    let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut ids = trimmed
            .split_whitespace()
            .map(|token| parse_node_id(token, line_no));
        let node = match ids.next() {
            Some(id) => id?,
            None => continue,
        };
        let neighbors = ids.collect::<Result<Vec<_>, _>>()?;

        for neighbor in &neighbors {
            adjacency.entry(*neighbor).or_default();
        }
        adjacency.entry(node).or_default().extend(neighbors);
    }

    for source in sources {
        adjacency.entry(*source).or_default();
    }

    let sources: HashSet<NodeId> = sources.iter().copied().collect();
    Ok(adjacency
        .into_iter()
        .map(|(id, neighbors)| {
            if sources.contains(&id) {
                NodeRecord::source(id, neighbors)
            } else {
                NodeRecord::unreached(id, neighbors)
            }
        })
        .collect())
}

fn parse_node_id(token: &str, line: usize) -> Result<NodeId, GraphError> {
    token.parse().map_err(|_| GraphError::InvalidNodeId {
        line,
        token: token.to_string(),
    })
}

/// Materialise round-0 records as a complete round directory.
///
/// Records go through the same partitioner the reduce phase uses, so a
/// converged round has the same file layout as the snapshot it started from.
pub async fn write_initial_round(
    records: Vec<NodeRecord>,
    dir: &Path,
    partitions: usize,
) -> Result<RoundManifest, StoreError> {
    store::prepare_dir(dir).await?;

    let nodes = records.len() as u64;
    let reached = records.iter().filter(|r| r.is_reached()).count() as u64;
    let partitioner = Partitioner::new(partitions);

    for (partition, bucket) in partitioner
        .split(records.into_iter().map(|record| (record.id, record)))
        .into_iter()
        .enumerate()
    {
        let mut buf = Vec::new();
        for (_, record) in &bucket {
            record.encode_into(&mut buf);
        }
        debug!(
            "Writing {} round-0 record(s) to partition {}",
            bucket.len(),
            partition
        );
        let path = dir.join(store::part_file_name(partition));
        store::write_atomic(&path, &buf)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
    }

    let manifest = RoundManifest::initial(partitioner.partitions(), nodes, reached);
    store::write_manifest(dir, &manifest).await?;
    Ok(manifest)
}

/// Read a text graph from `input` and write its round-0 snapshot to `dir`.
pub async fn encode_graph(
    input: &Path,
    dir: &Path,
    sources: &[NodeId],
    partitions: usize,
) -> Result<RoundManifest, ReachError> {
    let text = tokio::fs::read_to_string(input)
        .await
        .map_err(|source| ReachError::Io {
            path: input.to_path_buf(),
            source,
        })?;

    let records = parse_adjacency_list(&text, sources)?;
    let manifest = write_initial_round(records, dir, partitions).await?;

    info!(
        "Encoded {} node(s), {} source(s) into {} partition(s) at {}",
        manifest.nodes,
        manifest.reached,
        manifest.partitions,
        dir.display()
    );
    Ok(manifest)
}
