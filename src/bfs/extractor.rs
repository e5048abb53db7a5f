//! Reachability extraction over a converged snapshot
//!
//! Map-only: each converged partition becomes one text shard, keeping the
//! records whose distance is finite. The decision depends on nothing but the
//! record itself, so there is no shuffle.

use super::orchestrator::ConvergedSnapshot;
use crate::error::ReachError;
use crate::graph::{NodeRecord, RecordReader};
use crate::runtime::store;
use crate::runtime::{TaskError, TaskPhase, TaskPool};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub fn shard_file_name(partition: usize) -> String {
    format!("part-m-{partition:05}")
}

/// `id<TAB>{distance, [n1, n2, ...]}`
pub fn format_line(record: &NodeRecord) -> String {
    format!("{}\t{}", record.id, record)
}

/// Keep the records some source can reach.
pub fn reachable(records: impl IntoIterator<Item = NodeRecord>) -> impl Iterator<Item = NodeRecord> {
    records.into_iter().filter(NodeRecord::is_reached)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub shards: usize,
    pub scanned: u64,
    pub reachable: u64,
}

pub struct Extractor {
    pool: TaskPool,
}

impl Extractor {
    pub fn new(pool: TaskPool) -> Self {
        Self { pool }
    }

    /// Write the reachable records of `snapshot` under `output`, replacing
    /// whatever was there.
    pub async fn run(&self, snapshot: &ConvergedSnapshot, output: &Path) -> Result<ExtractSummary, ReachError> {
        let round = snapshot.round();
        let parts = Arc::new(store::list_partitions(snapshot.dir()).await?);
        store::prepare_dir(output).await?;

        info!(
            "Extracting reachable nodes from round {} ({} partition(s))",
            round,
            parts.len()
        );

        let shards = parts.len();
        let output = output.to_path_buf();
        let counts = self
            .pool
            .run(TaskPhase::Extract, shards, move |partition| {
                extract_partition(
                    parts[partition].clone(),
                    output.join(shard_file_name(partition)),
                )
            })
            .await
            .map_err(|source| ReachError::Extract { round, source })?;

        let summary = counts.into_iter().fold(
            ExtractSummary {
                shards,
                ..ExtractSummary::default()
            },
            |acc, (scanned, kept)| ExtractSummary {
                scanned: acc.scanned + scanned,
                reachable: acc.reachable + kept,
                ..acc
            },
        );
        info!(
            "{} of {} node(s) reachable",
            summary.reachable, summary.scanned
        );
        Ok(summary)
    }
}

async fn extract_partition(input: PathBuf, shard: PathBuf) -> Result<(u64, u64), TaskError> {
    let bytes = fs::read(&input).await.map_err(|e| TaskError::io(&input, e))?;
    let records = RecordReader::new(&bytes)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TaskError::corrupt(&input, e))?;
    let scanned = records.len() as u64;

    let mut text = String::new();
    let mut kept = 0u64;
    for record in reachable(records) {
        text.push_str(&format_line(&record));
        text.push('\n');
        kept += 1;
    }

    store::write_atomic(&shard, text.as_bytes())
        .await
        .map_err(|e| TaskError::io(&shard, e))?;
    debug!("{}: kept {} of {} record(s)", shard.display(), kept, scanned);
    Ok((scanned, kept))
}
