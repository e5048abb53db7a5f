//! Job configuration
//!
//! A job is configured from an optional TOML file, then from command-line
//! overrides, and validated once before anything touches the work directory.
//!
//! ```toml
//! partitions = 8
//! max_parallel = 4
//! max_rounds = 50
//! round_timeout = "10m"
//!
//! [retry]
//! attempts = 5
//! initial_delay = "200ms"
//! backoff = "fixed"
//! ```

use crate::error::ReachError;
use crate::runtime::{RetryPolicy, TaskPool};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    /// Number of reduce partitions each round writes
    pub partitions: usize,

    /// Partition tasks allowed to run at once
    pub max_parallel: usize,

    /// Ceiling on the number of rounds; the node count is always a ceiling
    pub max_rounds: Option<u32>,

    /// Wall-clock budget for a single round
    #[serde(default, with = "humantime_serde")]
    pub round_timeout: Option<Duration>,

    /// Keep each round's shuffle spill files instead of deleting them
    pub keep_intermediate: bool,

    pub retry: RetryPolicy,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            max_parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_rounds: None,
            round_timeout: None,
            keep_intermediate: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub partitions: Option<usize>,
    pub max_parallel: Option<usize>,
    pub max_rounds: Option<u32>,
    pub round_timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub keep_intermediate: bool,
}

impl JobConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ReachError> {
        toml::from_str(text).map_err(|source| ReachError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, ReachError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReachError::io(path, e))?;
        Self::from_toml_str(&text, path)
    }

    /// Load `path` if given, apply `overrides`, and validate the result.
    pub async fn resolve(path: Option<&Path>, overrides: JobOverrides) -> Result<Self, ReachError> {
        let config = match path {
            Some(path) => Self::load(path).await?,
            None => Self::default(),
        };
        let config = config.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: JobOverrides) -> Self {
        if let Some(partitions) = overrides.partitions {
            self.partitions = partitions;
        }
        if let Some(max_parallel) = overrides.max_parallel {
            self.max_parallel = max_parallel;
        }
        if let Some(max_rounds) = overrides.max_rounds {
            self.max_rounds = Some(max_rounds);
        }
        if let Some(timeout) = overrides.round_timeout {
            self.round_timeout = Some(timeout);
        }
        if let Some(attempts) = overrides.retry_attempts {
            self.retry.attempts = attempts;
        }
        self.keep_intermediate |= overrides.keep_intermediate;
        self
    }

    pub fn validate(&self) -> Result<(), ReachError> {
        if self.partitions == 0 {
            return Err(ReachError::config("partitions must be at least 1"));
        }
        if self.max_parallel == 0 {
            return Err(ReachError::config("max_parallel must be at least 1"));
        }
        if self.retry.attempts == 0 {
            return Err(ReachError::config("retry.attempts must be at least 1"));
        }
        if self.max_rounds == Some(0) {
            return Err(ReachError::config("max_rounds must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ReachError::config(format!(
                "retry.jitter_factor must be between 0 and 1, got {}",
                self.retry.jitter_factor
            )));
        }
        if matches!(self.round_timeout, Some(t) if t.is_zero()) {
            return Err(ReachError::config("round_timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Rounds allowed for a graph of `node_count` vertices.
    ///
    /// A shortest path visits every vertex at most once, so distances settle
    /// within `node_count - 1` changing rounds and one stable round.
    pub fn round_limit(&self, node_count: u64) -> u32 {
        let by_size = u32::try_from(node_count.max(1)).unwrap_or(u32::MAX);
        match self.max_rounds {
            Some(max) => max.min(by_size),
            None => by_size,
        }
    }

    pub fn task_pool(&self) -> TaskPool {
        TaskPool::new(self.max_parallel, self.retry.clone())
    }
}
