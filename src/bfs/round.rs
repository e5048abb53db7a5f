//! One propagation round: map, shuffle, reduce
//!
//! Map tasks read one input partition each and spill their proposals into one
//! file per reduce partition under `<output>/_shuffle/`. Reduce tasks start
//! only after every map task has finished, read their column of spill files,
//! group proposals by target id, and write one output partition each. The
//! round's output directory holds nothing but complete partitions when
//! `run_round` returns `Ok`.

use super::convergence::PartitionSignal;
use super::mapper::map_node;
use super::proposal::{Proposal, ProposalReader};
use super::reducer::reduce_node;
use crate::config::JobConfig;
use crate::graph::{NodeId, RecordReader};
use crate::runtime::store::{self, part_file_name, spill_file_name, SHUFFLE_DIR};
use crate::runtime::{Partitioner, RoundError, StoreError, TaskError, TaskPhase, TaskPool};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// What a completed round produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutput {
    /// Output partitions written
    pub partitions: usize,
    /// Records read by the map phase
    pub input_records: u64,
    /// Counters from every reduce partition
    pub signals: Vec<PartitionSignal>,
}

/// Runs one round from a complete input snapshot into an output directory.
///
/// Implementations must either leave a complete set of output partitions or
/// return an error; the orchestrator publishes the manifest afterwards.
#[async_trait]
pub trait RoundExecutor: Send + Sync {
    async fn run_round(&self, round: u32, input: &Path, output: &Path) -> Result<RoundOutput, RoundError>;
}

/// Runs rounds in-process on a bounded task pool
#[derive(Debug, Clone)]
pub struct LocalRound {
    pool: TaskPool,
    partitioner: Partitioner,
    timeout: Option<Duration>,
    keep_intermediate: bool,
}

impl LocalRound {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            pool: config.task_pool(),
            partitioner: Partitioner::new(config.partitions),
            timeout: config.round_timeout,
            keep_intermediate: config.keep_intermediate,
        }
    }

    async fn execute(&self, round: u32, input: &Path, output: &Path) -> Result<RoundOutput, RoundError> {
        // Only complete rounds are valid input.
        store::read_manifest(input).await?;
        let inputs = Arc::new(store::list_partitions(input).await?);
        let map_count = inputs.len();
        let reduce_count = self.partitioner.partitions();

        store::prepare_dir(output).await?;
        let shuffle = output.join(SHUFFLE_DIR);
        fs::create_dir_all(&shuffle)
            .await
            .map_err(|e| StoreError::io(&shuffle, e))?;

        info!(
            "Round {}: mapping {} partition(s) into {} reduce partition(s)",
            round, map_count, reduce_count
        );

        let partitioner = self.partitioner;
        let map_shuffle = shuffle.clone();
        let mapped = self
            .pool
            .run(TaskPhase::Map, map_count, move |map| {
                map_partition(inputs[map].clone(), map_shuffle.clone(), map, partitioner)
            })
            .await?;
        let input_records: u64 = mapped.iter().sum();

        let reduce_shuffle = shuffle.clone();
        let reduce_output = output.to_path_buf();
        let signals = self
            .pool
            .run(TaskPhase::Reduce, reduce_count, move |reduce| {
                reduce_partition(reduce_shuffle.clone(), reduce_output.clone(), reduce, map_count)
            })
            .await?;

        if self.keep_intermediate {
            debug!("Keeping shuffle files in {}", shuffle.display());
        } else {
            store::remove_dir(&shuffle).await?;
        }

        Ok(RoundOutput {
            partitions: reduce_count,
            input_records,
            signals,
        })
    }
}

#[async_trait]
impl RoundExecutor for LocalRound {
    async fn run_round(&self, round: u32, input: &Path, output: &Path) -> Result<RoundOutput, RoundError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(round, input, output))
                .await
                .map_err(|_| RoundError::Timeout(limit))?,
            None => self.execute(round, input, output).await,
        }
    }
}

/// Map one input partition into one spill file per reduce partition.
///
/// Every spill file is written, empty or not, so reducers can tell a map
/// task with nothing to say from one that never ran.
async fn map_partition(
    input: PathBuf,
    shuffle: PathBuf,
    map: usize,
    partitioner: Partitioner,
) -> Result<u64, TaskError> {
    let bytes = fs::read(&input).await.map_err(|e| TaskError::io(&input, e))?;

    let mut spills: Vec<Vec<u8>> = vec![Vec::new(); partitioner.partitions()];
    let mut records = 0u64;
    for record in RecordReader::new(&bytes) {
        let record = record.map_err(|e| TaskError::corrupt(&input, e))?;
        records += 1;
        map_node(record, &mut |target, proposal| {
            proposal.encode_into(target, &mut spills[partitioner.partition(target)]);
        });
    }

    for (reduce, spill) in spills.iter().enumerate() {
        let path = shuffle.join(spill_file_name(map, reduce));
        store::write_atomic(&path, spill)
            .await
            .map_err(|e| TaskError::io(&path, e))?;
    }

    debug!("Mapped {} record(s) from {}", records, input.display());
    Ok(records)
}

/// Reduce every spill file addressed to partition `reduce` into one output
/// partition, sorted by node id.
async fn reduce_partition(
    shuffle: PathBuf,
    output: PathBuf,
    reduce: usize,
    map_count: usize,
) -> Result<PartitionSignal, TaskError> {
    let mut proposals: Vec<(NodeId, Proposal)> = Vec::new();
    for map in 0..map_count {
        let path = shuffle.join(spill_file_name(map, reduce));
        let bytes = fs::read(&path).await.map_err(|e| TaskError::io(&path, e))?;
        for item in ProposalReader::new(&bytes) {
            proposals.push(item.map_err(|e| TaskError::corrupt(&path, e))?);
        }
    }

    // Stable, so the merge never depends on which map task finished first.
    proposals.sort_by_key(|(id, _)| *id);

    let mut signal = PartitionSignal {
        partition: reduce,
        records: 0,
        changed: 0,
        reached: 0,
    };
    let mut buf = Vec::new();
    let mut proposals = proposals.into_iter().peekable();
    while let Some((id, first)) = proposals.next() {
        let mut group = vec![first];
        while let Some((_, next)) = proposals.next_if(|(next, _)| *next == id) {
            group.push(next);
        }

        let reduced = reduce_node(id, group)?;
        signal.records += 1;
        signal.changed += u64::from(reduced.changed);
        signal.reached += u64::from(reduced.record.is_reached());
        reduced.record.encode_into(&mut buf);
    }

    let path = output.join(part_file_name(reduce));
    store::write_atomic(&path, &buf)
        .await
        .map_err(|e| TaskError::io(&path, e))?;

    debug!(
        "Reduced partition {}: {} record(s), {} changed",
        reduce, signal.records, signal.changed
    );
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{write_initial_round, Distance, NodeRecord};
    use crate::runtime::{RetryPolicy, RoundManifest};
    use tempfile::TempDir;

    fn config(partitions: usize) -> JobConfig {
        JobConfig {
            partitions,
            max_parallel: 2,
            retry: RetryPolicy::none(),
            ..JobConfig::default()
        }
    }

    fn sample_graph() -> Vec<NodeRecord> {
        vec![
            NodeRecord::source(1, vec![2, 4]),
            NodeRecord::unreached(2, vec![3]),
            NodeRecord::unreached(3, vec![]),
            NodeRecord::unreached(4, vec![]),
            NodeRecord::unreached(5, vec![]),
        ]
    }

    async fn read_round(dir: &Path) -> Vec<NodeRecord> {
        let mut records = Vec::new();
        for part in store::list_partitions(dir).await.unwrap() {
            let bytes = fs::read(&part).await.unwrap();
            records.extend(RecordReader::new(&bytes).map(Result::unwrap));
        }
        records.sort_by_key(|r| r.id);
        records
    }

    #[tokio::test]
    async fn test_first_round_reaches_direct_neighbors() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("round-0000");
        let output = temp.path().join("round-0001");
        write_initial_round(sample_graph(), &input, 2).await.unwrap();

        let result = LocalRound::new(&config(3))
            .run_round(1, &input, &output)
            .await
            .unwrap();

        assert_eq!(result.partitions, 3);
        assert_eq!(result.input_records, 5);
        let changed: u64 = result.signals.iter().map(|s| s.changed).sum();
        assert_eq!(changed, 2);

        let distances: Vec<_> = read_round(&output)
            .await
            .into_iter()
            .map(|r| (r.id, r.distance))
            .collect();
        let one = Distance::from_raw(1).unwrap();
        assert_eq!(
            distances,
            vec![
                (1, Distance::ZERO),
                (2, one),
                (3, Distance::UNREACHED),
                (4, one),
                (5, Distance::UNREACHED),
            ]
        );
        assert!(!output.join(SHUFFLE_DIR).exists());
    }

    #[tokio::test]
    async fn test_keep_intermediate_leaves_spill_files() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("round-0000");
        let output = temp.path().join("round-0001");
        write_initial_round(sample_graph(), &input, 2).await.unwrap();

        let config = JobConfig {
            keep_intermediate: true,
            ..config(2)
        };
        LocalRound::new(&config)
            .run_round(1, &input, &output)
            .await
            .unwrap();

        // 2 map partitions x 2 reduce partitions
        let shuffle = output.join(SHUFFLE_DIR);
        assert!(shuffle.join(spill_file_name(0, 0)).exists());
        assert!(shuffle.join(spill_file_name(1, 1)).exists());
    }

    #[tokio::test]
    async fn test_input_without_manifest_is_rejected() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("round-0000");
        fs::create_dir_all(&input).await.unwrap();

        let err = LocalRound::new(&config(1))
            .run_round(1, &input, &temp.path().join("round-0001"))
            .await
            .unwrap_err();

        assert!(matches!(err, RoundError::Store(_)));
    }

    #[tokio::test]
    async fn test_corrupt_partition_fails_the_round() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("round-0000");
        write_initial_round(sample_graph(), &input, 1).await.unwrap();
        fs::write(input.join(part_file_name(0)), [0, 0, 0, 1, 0, 0])
            .await
            .unwrap();

        let err = LocalRound::new(&config(1))
            .run_round(1, &input, &temp.path().join("round-0001"))
            .await
            .unwrap_err();

        match err {
            RoundError::TaskFailed { phase, source, .. } => {
                assert_eq!(phase, TaskPhase::Map);
                assert!(matches!(source, TaskError::Corrupt { .. }));
            }
            other => panic!("Expected TaskFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_node_fails_in_reduce() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("round-0000");
        fs::create_dir_all(&input).await.unwrap();
        let mut buf = NodeRecord::source(1, vec![]).encode();
        NodeRecord::unreached(1, vec![]).encode_into(&mut buf);
        fs::write(input.join(part_file_name(0)), &buf).await.unwrap();
        store::write_manifest(&input, &RoundManifest::initial(1, 2, 1))
            .await
            .unwrap();

        let err = LocalRound::new(&config(1))
            .run_round(1, &input, &temp.path().join("round-0001"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RoundError::TaskFailed {
                phase: TaskPhase::Reduce,
                source: TaskError::Inconsistent(_),
                ..
            }
        ));
    }
}
