//! Failure types for partition tasks and whole rounds
//!
//! A `TaskError` is what one mapper, reducer, or extractor instance hit. The
//! task pool retries the retryable ones; when a task gives up, the round fails
//! with a `RoundError` and nothing it produced is published.

use crate::bfs::reducer::ReduceError;
use crate::graph::RecordError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Which kind of task a partition index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    Map,
    Reduce,
    Extract,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Map => write!(f, "map"),
            TaskPhase::Reduce => write!(f, "reduce"),
            TaskPhase::Extract => write!(f, "extract"),
        }
    }
}

/// Failure inside a single partition task
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt input in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: RecordError,
    },

    #[error(transparent)]
    Inconsistent(#[from] ReduceError),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, source: RecordError) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }

    /// Only transient I/O is worth another attempt; re-reading corrupt or
    /// inconsistent input yields the same answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Io { .. })
    }
}

/// Failure of the distributed store outside any single task
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unreadable round manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not a complete round (no manifest)")]
    Incomplete { path: PathBuf },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A round that could not be completed
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("{phase} task for partition {partition} failed after {attempts} attempt(s): {source}")]
    TaskFailed {
        phase: TaskPhase,
        partition: usize,
        attempts: u32,
        #[source]
        source: TaskError,
    },

    #[error("{phase} task panicked or was cancelled: {message}")]
    TaskAborted { phase: TaskPhase, message: String },

    #[error("round exceeded its timeout of {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}
