//! Round-numbered storage of node-record sets
//!
//! ```text
//! <root>/round-0000/part-00000      binary node records
//! <root>/round-0000/_manifest.json  written last; marks the round complete
//! <root>/round-0001/_shuffle/       spill files, removed after reduce
//! ```
//!
//! Data files are written under a temporary name and renamed into place, so a
//! task that dies mid-write never leaves a partial partition behind.

use super::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MANIFEST_FILE: &str = "_manifest.json";
pub const SHUFFLE_DIR: &str = "_shuffle";
const PART_PREFIX: &str = "part-";

pub fn part_file_name(partition: usize) -> String {
    format!("{PART_PREFIX}{partition:05}")
}

pub fn spill_file_name(map: usize, reduce: usize) -> String {
    format!("map-{map:05}-part-{reduce:05}")
}

/// Summary written once a round's output is complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundManifest {
    pub round: u32,
    pub partitions: usize,
    pub nodes: u64,
    /// Nodes whose distance changed; `None` for round 0 and for rounds whose
    /// counters could not be read.
    pub changed: Option<u64>,
    pub reached: u64,
    pub converged: bool,
    pub completed_at: DateTime<Utc>,
}

impl RoundManifest {
    pub fn initial(partitions: usize, nodes: u64, reached: u64) -> Self {
        Self {
            round: 0,
            partitions,
            nodes,
            changed: None,
            reached,
            converged: false,
            completed_at: Utc::now(),
        }
    }
}

/// Names the chain of round directories under one root.
///
/// The store only decides where rounds live; executors decide what goes in
/// them.
#[derive(Debug, Clone)]
pub struct RoundStore {
    root: PathBuf,
}

impl RoundStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn round_dir(&self, round: u32) -> PathBuf {
        self.root.join(format!("round-{round:04}"))
    }
}

/// Remove anything at `dir` and recreate it empty.
pub async fn prepare_dir(dir: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(StoreError::io(dir, e)),
    }
    fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))
}

pub async fn remove_dir(dir: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(dir, e)),
    }
}

/// Partition files of a round directory, in partition order.
pub async fn list_partitions(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let mut parts = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let name = entry.file_name();
        let is_part = name
            .to_str()
            .map(|n| n.starts_with(PART_PREFIX) && !n.ends_with(".tmp"))
            .unwrap_or(false);
        if is_part {
            parts.push(entry.path());
        }
    }
    parts.sort();
    Ok(parts)
}

pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}

pub async fn write_manifest(dir: &Path, manifest: &RoundManifest) -> Result<(), StoreError> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_vec_pretty(manifest).map_err(|source| StoreError::Manifest {
        path: path.clone(),
        source,
    })?;
    write_atomic(&path, &json)
        .await
        .map_err(|e| StoreError::io(&path, e))
}

/// Read the manifest of a complete round.
///
/// A directory without one is reported as `Incomplete`.
pub async fn read_manifest(dir: &Path) -> Result<RoundManifest, StoreError> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::Incomplete {
                path: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(StoreError::io(&path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Manifest { path, source })
}
