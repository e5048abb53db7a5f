//! Job state machine for the round sequence
//!
//! ```text
//! Running(0) --changed--> Running(1) --changed--> ... --stable--> Converged(n)
//!      \                        \
//!       +--failure / limit------+-----> Aborted(n)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum AbortReason {
    /// The round ceiling was reached while nodes were still changing
    RoundLimit { limit: u32 },
    /// A round could not be completed
    RoundFailure { message: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::RoundLimit { limit } => write!(f, "round limit {limit} reached"),
            AbortReason::RoundFailure { message } => write!(f, "round failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobState {
    /// Round `round` is the latest complete snapshot and the next round is
    /// about to run on it.
    Running { round: u32 },
    /// Round `round` is final; nothing changed in it.
    Converged { round: u32 },
    Aborted { round: u32, reason: AbortReason },
}

/// What happened to the round that was just attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Changed,
    Stable,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid transition from terminal state {from}")]
    InvalidTransition { from: JobState },
}

impl JobState {
    pub fn initial() -> Self {
        JobState::Running { round: 0 }
    }

    pub fn round(&self) -> u32 {
        match self {
            JobState::Running { round }
            | JobState::Converged { round }
            | JobState::Aborted { round, .. } => *round,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running { .. })
    }

    /// The only state whose snapshot may be handed to the extractor
    pub fn is_converged(&self) -> bool {
        matches!(self, JobState::Converged { .. })
    }

    /// Apply the outcome of running round `self.round() + 1`.
    ///
    /// A changed round that lands on `limit` aborts instead of scheduling
    /// another one. A failed round leaves the round counter where it was,
    /// since its output was never published.
    pub fn advance(&self, outcome: RoundOutcome, limit: u32) -> Result<JobState, StateError> {
        let JobState::Running { round } = self else {
            return Err(StateError::InvalidTransition { from: self.clone() });
        };
        let completed = round + 1;

        let next = match outcome {
            RoundOutcome::Stable => JobState::Converged { round: completed },
            RoundOutcome::Changed if completed >= limit => JobState::Aborted {
                round: completed,
                reason: AbortReason::RoundLimit { limit },
            },
            RoundOutcome::Changed => JobState::Running { round: completed },
            RoundOutcome::Failed { message } => JobState::Aborted {
                round: *round,
                reason: AbortReason::RoundFailure { message },
            },
        };
        Ok(next)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running { round } => write!(f, "RUNNING({round})"),
            JobState::Converged { round } => write!(f, "CONVERGED({round})"),
            JobState::Aborted { round, reason } => write!(f, "ABORTED({round}: {reason})"),
        }
    }
}
