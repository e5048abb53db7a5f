//! Drives the sequence of rounds until distances stop changing
//!
//! Rounds are strictly sequential: round `n + 1` reads exactly the output of
//! round `n`, and is not started until round `n` has been reduced, its
//! counters folded, and its manifest published. The orchestrator only names
//! and chains round directories; what is inside them is the executor's job.

use super::convergence::{ConvergenceSignal, ConvergenceTracker};
use super::round::RoundExecutor;
use super::state::{AbortReason, JobState, RoundOutcome, StateError};
use crate::config::JobConfig;
use crate::error::ReachError;
use crate::runtime::store::{self, RoundManifest, RoundStore};
use crate::runtime::RoundError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Counters for one published round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub nodes: u64,
    /// `None` when the round's counters were incomplete
    pub changed: Option<u64>,
    pub reached: u64,
    pub converged: bool,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl RoundSummary {
    fn from_manifest(manifest: &RoundManifest, elapsed: Duration) -> Self {
        Self {
            round: manifest.round,
            nodes: manifest.nodes,
            changed: manifest.changed,
            reached: manifest.reached,
            converged: manifest.converged,
            elapsed,
        }
    }
}

/// Result of a job that converged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub state: JobState,
    /// Rounds executed after the round-0 snapshot
    pub rounds_executed: u32,
    pub round_limit: u32,
    pub nodes: u64,
    pub reached: u64,
    pub final_dir: PathBuf,
    pub history: Vec<RoundSummary>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// A round directory whose manifest says nothing changed in it.
///
/// Only a value of this type can be handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergedSnapshot {
    dir: PathBuf,
    manifest: RoundManifest,
}

impl ConvergedSnapshot {
    pub async fn open(dir: &Path) -> Result<Self, ReachError> {
        let manifest = store::read_manifest(dir).await?;
        if !manifest.converged {
            return Err(ReachError::NotConverged {
                path: dir.to_path_buf(),
                round: manifest.round,
            });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn round(&self) -> u32 {
        self.manifest.round
    }

    pub fn manifest(&self) -> &RoundManifest {
        &self.manifest
    }
}

#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub summary: RunSummary,
    pub snapshot: ConvergedSnapshot,
}

pub struct Orchestrator<E: RoundExecutor> {
    executor: E,
    store: RoundStore,
    config: JobConfig,
}

impl<E: RoundExecutor> Orchestrator<E> {
    pub fn new(executor: E, store: RoundStore, config: JobConfig) -> Self {
        Self {
            executor,
            store,
            config,
        }
    }

    pub fn store(&self) -> &RoundStore {
        &self.store
    }

    /// Run rounds from the store's round-0 snapshot until convergence.
    ///
    /// Every completed round is published with its manifest, converged or
    /// not. A failed round publishes nothing and ends the job with the round
    /// number attached.
    pub async fn run(&self) -> Result<CompletedRun, ReachError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let initial = store::read_manifest(&self.store.round_dir(0)).await?;
        let limit = self.config.round_limit(initial.nodes);
        let mut history = vec![RoundSummary::from_manifest(&initial, Duration::ZERO)];
        let mut state = JobState::initial();

        info!(
            "Starting from round 0: {} node(s), {} source(s), at most {} round(s)",
            initial.nodes, initial.reached, limit
        );

        while let JobState::Running { round: current } = state {
            let next = current + 1;
            let input = self.store.round_dir(current);
            let output = self.store.round_dir(next);

            let summary = match publish_round(&self.executor, next, &input, &output).await {
                Ok(summary) => summary,
                Err(e) => {
                    let message = e.to_string();
                    state = state.advance(RoundOutcome::Failed { message }, limit)?;
                    error!("Job stopped in {}", state);
                    return Err(e);
                }
            };

            let outcome = if summary.converged {
                RoundOutcome::Stable
            } else {
                RoundOutcome::Changed
            };
            state = state.advance(outcome, limit)?;
            history.push(summary);
            info!("Job is {}", state);
        }

        match state {
            JobState::Converged { round } => {
                let final_dir = self.store.round_dir(round);
                let snapshot = ConvergedSnapshot::open(&final_dir).await?;
                let summary = RunSummary {
                    state: state.clone(),
                    rounds_executed: round,
                    round_limit: limit,
                    nodes: snapshot.manifest().nodes,
                    reached: snapshot.manifest().reached,
                    final_dir,
                    history,
                    started_at,
                    elapsed: clock.elapsed(),
                };
                Ok(CompletedRun { summary, snapshot })
            }
            JobState::Aborted {
                round,
                reason: AbortReason::RoundLimit { limit },
            } => {
                error!("Distances still changing after round {}", round);
                Err(ReachError::RoundLimitExceeded { round, limit })
            }
            other => Err(StateError::InvalidTransition { from: other }.into()),
        }
    }
}

/// Run exactly one round from the complete snapshot in `input` into
/// `output`, outside any round chain. The round number follows the input's.
pub async fn run_single_round<E>(executor: &E, input: &Path, output: &Path) -> Result<RoundSummary, ReachError>
where
    E: RoundExecutor + ?Sized,
{
    let manifest = store::read_manifest(input).await?;
    publish_round(executor, manifest.round + 1, input, output).await
}

/// Run round `round` and publish its manifest.
async fn publish_round<E>(executor: &E, round: u32, input: &Path, output: &Path) -> Result<RoundSummary, ReachError>
where
    E: RoundExecutor + ?Sized,
{
    let clock = Instant::now();
    let result = executor
        .run_round(round, input, output)
        .await
        .map_err(|source| ReachError::Round { round, source })?;

    let mut tracker = ConvergenceTracker::new(result.partitions);
    tracker.extend(result.signals);
    let signal = tracker.signal();
    let totals = tracker.totals();

    if let ConvergenceSignal::Unknown { missing } = &signal {
        warn!(
            "Round {}: no counters from partition(s) {:?}, treating the round as changed",
            round, missing
        );
    }

    let manifest = RoundManifest {
        round,
        partitions: result.partitions,
        nodes: result.input_records,
        changed: signal.changed_nodes(),
        reached: totals.reached,
        converged: !signal.requires_another_round(),
        completed_at: Utc::now(),
    };
    store::write_manifest(output, &manifest)
        .await
        .map_err(|e| ReachError::Round {
            round,
            source: RoundError::Store(e),
        })?;

    info!(
        "Round {} complete: {} changed, {} of {} reached",
        round,
        manifest
            .changed
            .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
        manifest.reached,
        manifest.nodes
    );
    Ok(RoundSummary::from_manifest(&manifest, clock.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfs::convergence::PartitionSignal;
    use crate::bfs::round::RoundOutput;
    use crate::runtime::store::MANIFEST_FILE;
    use crate::runtime::TaskPhase;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// What the scripted executor does for one round
    enum Step {
        Changed(u64),
        MissingCounters,
        Fail,
        /// Completes, but leaves the output unable to take a manifest
        BlockManifest,
    }

    struct ScriptedRound {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<(u32, PathBuf, PathBuf)>>,
    }

    impl ScriptedRound {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RoundExecutor for ScriptedRound {
        async fn run_round(&self, round: u32, input: &Path, output: &Path) -> Result<RoundOutput, RoundError> {
            self.calls
                .lock()
                .unwrap()
                .push((round, input.to_path_buf(), output.to_path_buf()));
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Changed(0));

            let signals = match step {
                Step::Changed(changed) => vec![
                    PartitionSignal {
                        partition: 0,
                        records: 6,
                        changed,
                        reached: 3,
                    },
                    PartitionSignal {
                        partition: 1,
                        records: 4,
                        changed: 0,
                        reached: 1,
                    },
                ],
                Step::MissingCounters => vec![PartitionSignal {
                    partition: 0,
                    records: 6,
                    changed: 0,
                    reached: 3,
                }],
                Step::BlockManifest => {
                    tokio::fs::create_dir_all(output.join(MANIFEST_FILE).join("occupied"))
                        .await
                        .unwrap();
                    vec![PartitionSignal {
                        partition: 0,
                        records: 10,
                        changed: 1,
                        reached: 4,
                    }]
                }
                Step::Fail => {
                    return Err(RoundError::TaskAborted {
                        phase: TaskPhase::Reduce,
                        message: "worker lost".into(),
                    })
                }
            };

            tokio::fs::create_dir_all(output).await.unwrap();
            Ok(RoundOutput {
                partitions: 2,
                input_records: 10,
                signals,
            })
        }
    }

    async fn orchestrator(steps: Vec<Step>, config: JobConfig) -> (TempDir, Orchestrator<ScriptedRound>) {
        let temp = TempDir::new().unwrap();
        let store = RoundStore::new(temp.path());
        let round_zero = store.round_dir(0);
        tokio::fs::create_dir_all(&round_zero).await.unwrap();
        store::write_manifest(&round_zero, &RoundManifest::initial(2, 10, 1))
            .await
            .unwrap();
        (temp, Orchestrator::new(ScriptedRound::new(steps), store, config))
    }

    #[tokio::test]
    async fn test_runs_until_a_round_changes_nothing() {
        let (_temp, orchestrator) = orchestrator(
            vec![Step::Changed(2), Step::Changed(1), Step::Changed(0)],
            JobConfig::default(),
        )
        .await;

        let completed = orchestrator.run().await.unwrap();

        assert_eq!(completed.summary.state, JobState::Converged { round: 3 });
        assert_eq!(completed.summary.rounds_executed, 3);
        assert_eq!(completed.summary.history.len(), 4);
        assert_eq!(completed.summary.history[1].changed, Some(2));
        assert_eq!(completed.snapshot.round(), 3);
        assert_eq!(completed.summary.reached, 4);
    }

    #[tokio::test]
    async fn test_each_round_reads_the_previous_output() {
        let (_temp, orchestrator) =
            orchestrator(vec![Step::Changed(1), Step::Changed(0)], JobConfig::default()).await;

        orchestrator.run().await.unwrap();

        let calls = orchestrator.executor.calls.lock().unwrap();
        let store = orchestrator.store();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (1, store.round_dir(0), store.round_dir(1)));
        assert_eq!(calls[1], (2, store.round_dir(1), store.round_dir(2)));
    }

    #[tokio::test]
    async fn test_missing_counters_force_another_round() {
        let (_temp, orchestrator) = orchestrator(
            vec![Step::MissingCounters, Step::Changed(0)],
            JobConfig::default(),
        )
        .await;

        let completed = orchestrator.run().await.unwrap();

        assert_eq!(completed.summary.state, JobState::Converged { round: 2 });
        assert_eq!(completed.summary.history[1].changed, None);
        assert!(!completed.summary.history[1].converged);
    }

    #[tokio::test]
    async fn test_round_limit_aborts_with_round_number() {
        let config = JobConfig {
            max_rounds: Some(2),
            ..JobConfig::default()
        };
        let (_temp, orchestrator) =
            orchestrator(vec![Step::Changed(1), Step::Changed(1), Step::Changed(1)], config).await;

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(
            err,
            ReachError::RoundLimitExceeded { round: 2, limit: 2 }
        ));
        assert_eq!(orchestrator.executor.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_round_is_not_published() {
        let (_temp, orchestrator) =
            orchestrator(vec![Step::Changed(1), Step::Fail], JobConfig::default()).await;

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, ReachError::Round { round: 2, .. }));
        let store = orchestrator.store();
        assert!(store::read_manifest(&store.round_dir(1)).await.is_ok());
        assert!(store::read_manifest(&store.round_dir(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_unwritable_manifest_fails_with_round_number() {
        let (_temp, orchestrator) =
            orchestrator(vec![Step::Changed(1), Step::BlockManifest], JobConfig::default()).await;

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(
            err,
            ReachError::Round {
                round: 2,
                source: RoundError::Store(_)
            }
        ));
        assert_eq!(err.round(), Some(2));
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_unconverged_snapshot_cannot_be_opened() {
        let (_temp, orchestrator) = orchestrator(vec![], JobConfig::default()).await;

        let err = ConvergedSnapshot::open(&orchestrator.store().round_dir(0))
            .await
            .unwrap_err();

        assert!(matches!(err, ReachError::NotConverged { round: 0, .. }));
    }

    #[tokio::test]
    async fn test_single_round_numbers_from_input_manifest() {
        let (temp, orchestrator) = orchestrator(vec![Step::Changed(0)], JobConfig::default()).await;
        let output = temp.path().join("next");

        let summary = run_single_round(
            &orchestrator.executor,
            &orchestrator.store().round_dir(0),
            &output,
        )
        .await
        .unwrap();

        assert_eq!(summary.round, 1);
        assert!(summary.converged);
        assert!(ConvergedSnapshot::open(&output).await.is_ok());
    }
}
