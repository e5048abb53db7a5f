//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use reachmap::config::JobConfig;
use reachmap::graph::{encode_graph, Distance, NodeId, RecordReader};
use reachmap::runtime::{store, RetryPolicy, RoundStore};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Edges 1->2, 2->3, 1->4 and the isolated node 5
pub const SAMPLE_GRAPH: &str = "\
# id neighbors
1 2 4
2 3
5
";

/// Temporary work directory holding one graph and its round chain
pub struct GraphFixture {
    temp_dir: TempDir,
}

impl GraphFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store(&self) -> RoundStore {
        RoundStore::new(self.path().join("rounds"))
    }

    /// Write `text` as the graph input file and return its path
    pub fn write_graph(&self, text: &str) -> Result<PathBuf> {
        let path = self.path().join("graph.txt");
        std::fs::write(&path, text)?;
        Ok(path)
    }

    /// Encode `text` into round 0 of the fixture's store
    pub async fn encode(&self, text: &str, sources: &[NodeId], partitions: usize) -> Result<RoundStore> {
        let input = self.write_graph(text)?;
        let store = self.store();
        encode_graph(&input, &store.round_dir(0), sources, partitions).await?;
        Ok(store)
    }
}

pub fn job_config(partitions: usize) -> JobConfig {
    JobConfig {
        partitions,
        max_parallel: 3,
        retry: RetryPolicy::none(),
        ..JobConfig::default()
    }
}

/// Distances of every record in a round directory, keyed by id
pub async fn read_distances(dir: &Path) -> Result<BTreeMap<NodeId, Distance>> {
    let mut distances = BTreeMap::new();
    for part in store::list_partitions(dir).await? {
        let bytes = tokio::fs::read(&part).await?;
        for record in RecordReader::new(&bytes) {
            let record = record?;
            distances.insert(record.id, record.distance);
        }
    }
    Ok(distances)
}

/// Raw bytes of every partition file, in partition order
pub async fn read_partitions(dir: &Path) -> Result<Vec<Vec<u8>>> {
    let mut parts = Vec::new();
    for part in store::list_partitions(dir).await? {
        parts.push(tokio::fs::read(&part).await?);
    }
    Ok(parts)
}

pub fn hops(n: i32) -> Distance {
    Distance::from_raw(n).expect("non-negative hop count")
}

/// Deterministic pseudo-random graph as adjacency-list text
pub fn generated_graph(nodes: i32, edges_per_node: usize, seed: u64) -> String {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as i32
    };

    let mut text = String::new();
    for node in 0..nodes {
        text.push_str(&node.to_string());
        for _ in 0..edges_per_node {
            // Some nodes get no edges at all, leaving parts of the graph unreachable.
            if next() % 4 == 0 {
                continue;
            }
            text.push(' ');
            text.push_str(&(next().rem_euclid(nodes)).to_string());
        }
        text.push('\n');
    }
    text
}

/// Plain queue-based BFS over the same text, for comparison
pub fn reference_distances(text: &str, sources: &[NodeId]) -> BTreeMap<NodeId, Distance> {
    let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for line in text.lines().filter(|l| !l.trim().is_empty() && !l.starts_with('#')) {
        let mut ids = line.split_whitespace().map(|t| t.parse::<NodeId>().unwrap());
        let node = ids.next().unwrap();
        let neighbors: Vec<_> = ids.collect();
        for n in &neighbors {
            adjacency.entry(*n).or_default();
        }
        adjacency.entry(node).or_default().extend(neighbors);
    }
    for s in sources {
        adjacency.entry(*s).or_default();
    }

    let mut distances: BTreeMap<NodeId, Distance> =
        adjacency.keys().map(|id| (*id, Distance::UNREACHED)).collect();
    let mut queue = VecDeque::new();
    for s in sources {
        distances.insert(*s, Distance::ZERO);
        queue.push_back(*s);
    }
    while let Some(node) = queue.pop_front() {
        let next = distances[&node].next_hop();
        for neighbor in &adjacency[&node] {
            if distances[neighbor] > next {
                distances.insert(*neighbor, next);
                queue.push_back(*neighbor);
            }
        }
    }
    distances
}
