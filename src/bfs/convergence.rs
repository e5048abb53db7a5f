//! Convergence tracking across the partitions of one round
//!
//! Each reduce partition reports its own counters; the orchestrator folds
//! them here once the round is over. A round whose counters are incomplete is
//! reported as `Unknown`, which callers treat like a change: an extra round
//! costs one pass, stopping early would publish wrong distances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Counters produced by one reduce partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSignal {
    pub partition: usize,
    /// Records written
    pub records: u64,
    /// Records whose distance differs from the start of the round
    pub changed: u64,
    /// Records with a finite distance
    pub reached: u64,
}

/// Aggregate answer to "did any node change this round?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceSignal {
    Changed { nodes: u64 },
    Stable,
    Unknown { missing: Vec<usize> },
}

impl ConvergenceSignal {
    /// Everything except a confirmed `Stable` keeps the job running.
    pub fn requires_another_round(&self) -> bool {
        !matches!(self, ConvergenceSignal::Stable)
    }

    pub fn changed_nodes(&self) -> Option<u64> {
        match self {
            ConvergenceSignal::Changed { nodes } => Some(*nodes),
            ConvergenceSignal::Stable => Some(0),
            ConvergenceSignal::Unknown { .. } => None,
        }
    }
}

/// Totals over the partitions that did report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundTotals {
    pub records: u64,
    pub changed: u64,
    pub reached: u64,
}

#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    expected: usize,
    signals: BTreeMap<usize, PartitionSignal>,
}

impl ConvergenceTracker {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            signals: BTreeMap::new(),
        }
    }

    /// Record one partition's counters. A repeated report for the same
    /// partition replaces the earlier one.
    pub fn record(&mut self, signal: PartitionSignal) {
        if signal.partition >= self.expected {
            warn!(
                "Ignoring counters for partition {} (round has {})",
                signal.partition, self.expected
            );
            return;
        }
        self.signals.insert(signal.partition, signal);
    }

    pub fn signal(&self) -> ConvergenceSignal {
        let missing: Vec<usize> = (0..self.expected)
            .filter(|p| !self.signals.contains_key(p))
            .collect();
        if !missing.is_empty() {
            return ConvergenceSignal::Unknown { missing };
        }

        match self.totals().changed {
            0 => ConvergenceSignal::Stable,
            nodes => ConvergenceSignal::Changed { nodes },
        }
    }

    pub fn totals(&self) -> RoundTotals {
        self.signals
            .values()
            .fold(RoundTotals::default(), |acc, s| RoundTotals {
                records: acc.records + s.records,
                changed: acc.changed + s.changed,
                reached: acc.reached + s.reached,
            })
    }
}

impl Extend<PartitionSignal> for ConvergenceTracker {
    fn extend<I: IntoIterator<Item = PartitionSignal>>(&mut self, iter: I) {
        for signal in iter {
            self.record(signal);
        }
    }
}
