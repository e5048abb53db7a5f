use crate::bfs::state::StateError;
use crate::graph::GraphError;
use crate::runtime::{RoundError, StoreError};
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// Top-level error for every reachmap operation.
///
/// Anything that stops a job carries the round it stopped at, so the caller
/// can tell which snapshot is the last one that was published.
#[derive(Error, Debug)]
pub enum ReachError {
    #[error("[E{code:04}] Configuration error: {message}", code = ErrorCode::CONFIG_INVALID_VALUE)]
    Config { message: String },

    #[error("[E{code:04}] Unreadable configuration {path}: {source}", code = ErrorCode::CONFIG_PARSE_ERROR)]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("[E{code:04}] Invalid graph: {0}", code = ErrorCode::GRAPH_INVALID)]
    InvalidGraph(#[from] GraphError),

    #[error("[E{code:04}] I/O failure on {path}: {source}", code = ErrorCode::STORAGE_IO_ERROR)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[E{code:04}] {0}", code = ErrorCode::STORAGE_ROUND)]
    Store(#[from] StoreError),

    #[error("[E{code:04}] Round {round} failed: {source}", code = ErrorCode::ROUND_FAILED)]
    Round {
        round: u32,
        #[source]
        source: RoundError,
    },

    #[error(
        "[E{code:04}] Round {round} hit the round limit of {limit} with distances still changing",
        code = ErrorCode::ROUND_LIMIT_EXCEEDED
    )]
    RoundLimitExceeded { round: u32, limit: u32 },

    #[error("[E{code:04}] {0}", code = ErrorCode::ROUND_INVALID_STATE)]
    InvalidState(#[from] StateError),

    #[error(
        "[E{code:04}] {path} (round {round}) has not converged; only a converged snapshot can be extracted",
        code = ErrorCode::EXTRACT_NOT_CONVERGED
    )]
    NotConverged { path: PathBuf, round: u32 },

    #[error("[E{code:04}] Extraction of round {round} failed: {source}", code = ErrorCode::EXTRACT_FAILED)]
    Extract {
        round: u32,
        #[source]
        source: RoundError,
    },
}

impl ReachError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Config { .. } => ErrorCode::CONFIG_INVALID_VALUE,
            Self::ConfigParse { .. } => ErrorCode::CONFIG_PARSE_ERROR,
            Self::InvalidGraph(_) => ErrorCode::GRAPH_INVALID,
            Self::Io { .. } => ErrorCode::STORAGE_IO_ERROR,
            Self::Store(_) => ErrorCode::STORAGE_ROUND,
            Self::Round { .. } => ErrorCode::ROUND_FAILED,
            Self::RoundLimitExceeded { .. } => ErrorCode::ROUND_LIMIT_EXCEEDED,
            Self::InvalidState(_) => ErrorCode::ROUND_INVALID_STATE,
            Self::NotConverged { .. } => ErrorCode::EXTRACT_NOT_CONVERGED,
            Self::Extract { .. } => ErrorCode::EXTRACT_FAILED,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::ConfigParse { .. } => 2,
            Self::InvalidGraph(_) => 3,
            Self::Io { .. } | Self::Store(_) => 4,
            Self::Round { .. } | Self::RoundLimitExceeded { .. } | Self::InvalidState(_) => 5,
            Self::NotConverged { .. } | Self::Extract { .. } => 6,
        }
    }

    /// Round the failure is attributed to, when there is one
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::Round { round, .. }
            | Self::RoundLimitExceeded { round, .. }
            | Self::NotConverged { round, .. }
            | Self::Extract { round, .. } => Some(*round),
            _ => None,
        }
    }

    /// Short message for the terminal, without the error chain
    pub fn user_message(&self) -> String {
        match self {
            Self::Round { round, .. } => {
                format!(
                    "Round {round} failed; round {} is the last complete snapshot",
                    round.saturating_sub(1)
                )
            }
            Self::RoundLimitExceeded { limit, .. } => {
                format!("Did not converge within {limit} round(s)")
            }
            Self::NotConverged { path, .. } => {
                format!("{} is not a converged snapshot", path.display())
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReachError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TaskPhase;
    use std::time::Duration;

    #[test]
    fn test_display_carries_code_and_round() {
        let err = ReachError::Round {
            round: 3,
            source: RoundError::Timeout(Duration::from_secs(5)),
        };

        let text = err.to_string();

        assert!(text.starts_with("[E4001]"), "{text}");
        assert!(text.contains("Round 3"), "{text}");
        assert_eq!(err.round(), Some(3));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_graph_errors_convert() {
        let err: ReachError = GraphError::NoSources.into();

        assert_eq!(err.code(), ErrorCode::GRAPH_INVALID);
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.round(), None);
    }

    #[test]
    fn test_round_failure_names_last_snapshot() {
        let err = ReachError::Round {
            round: 4,
            source: RoundError::TaskAborted {
                phase: TaskPhase::Reduce,
                message: "panicked".into(),
            },
        };

        assert_eq!(
            err.user_message(),
            "Round 4 failed; round 3 is the last complete snapshot"
        );
    }

    #[test]
    fn test_codes_are_stable() {
        let err = ReachError::NotConverged {
            path: PathBuf::from("/tmp/round-0002"),
            round: 2,
        };
        assert!(err.to_string().starts_with("[E5001]"));
        assert_eq!(err.code(), 5001);
    }
}
