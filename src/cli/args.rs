//! CLI argument structures

use crate::config::JobOverrides;
use crate::graph::NodeId;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Single-source reachability over partitioned graph snapshots
#[derive(Parser)]
#[command(name = "reachmap")]
#[command(about = "reachmap - round-based reachability over partitioned graph snapshots", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a text adjacency list into a round-0 snapshot
    #[command(name = "encode")]
    Encode {
        /// Adjacency list: `node neighbor...` per line
        #[arg(short, long)]
        input: PathBuf,

        /// Round directory to write
        #[arg(short, long)]
        output: PathBuf,

        /// Source node ids (distance 0)
        #[arg(short, long = "source", required = true, num_args = 1.., value_delimiter = ',', allow_negative_numbers = true)]
        sources: Vec<NodeId>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Run one propagation round from a complete round directory
    #[command(name = "iterate")]
    Iterate {
        /// Complete round directory to read
        #[arg(short, long)]
        input: PathBuf,

        /// Round directory to write
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Encode, iterate to convergence, and extract reachable nodes
    #[command(name = "run")]
    Run {
        /// Adjacency list: `node neighbor...` per line
        #[arg(short, long)]
        input: PathBuf,

        /// Work directory; cleared before the job starts
        #[arg(short, long)]
        output: PathBuf,

        /// Source node ids (distance 0)
        #[arg(short, long = "source", required = true, num_args = 1.., value_delimiter = ',', allow_negative_numbers = true)]
        sources: Vec<NodeId>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Write the reachable nodes of a converged round directory as text
    #[command(name = "extract")]
    Extract {
        /// Converged round directory
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for text shards; cleared first
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },
}

/// Job configuration flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct JobArgs {
    /// TOML job configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Reduce partitions per round
    #[arg(short = 'p', long)]
    pub partitions: Option<usize>,

    /// Partition tasks run at once
    #[arg(short = 'j', long)]
    pub max_parallel: Option<usize>,

    /// Give up if distances are still changing after this many rounds
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Wall-clock budget per round (e.g. "30s", "10m")
    #[arg(long, value_parser = parse_duration)]
    pub round_timeout: Option<Duration>,

    /// Attempts per partition task, including the first
    #[arg(long)]
    pub retries: Option<u32>,

    /// Keep shuffle spill files after each round
    #[arg(long)]
    pub keep_intermediate: bool,
}

impl JobArgs {
    pub fn overrides(&self) -> JobOverrides {
        JobOverrides {
            partitions: self.partitions,
            max_parallel: self.max_parallel,
            max_rounds: self.max_rounds,
            round_timeout: self.round_timeout,
            retry_attempts: self.retries,
            keep_intermediate: self.keep_intermediate,
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sources_accept_lists_and_repeats() {
        let cli = Cli::try_parse_from([
            "reachmap", "run", "-i", "g.txt", "-o", "out", "-s", "1,2", "--source", "-7",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { sources, .. } => assert_eq!(sources, vec![1, 2, -7]),
            _ => panic!("Expected run"),
        }
    }

    #[test]
    fn test_job_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "reachmap",
            "-vv",
            "iterate",
            "--input",
            "r0",
            "--output",
            "r1",
            "--partitions",
            "8",
            "--round-timeout",
            "90s",
            "--retries",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Iterate { job, .. } = cli.command else {
            panic!("Expected iterate");
        };
        let overrides = job.overrides();
        assert_eq!(overrides.partitions, Some(8));
        assert_eq!(overrides.round_timeout, Some(Duration::from_secs(90)));
        assert_eq!(overrides.retry_attempts, Some(5));
        assert!(!overrides.keep_intermediate);
    }

    #[test]
    fn test_encode_requires_a_source() {
        assert!(Cli::try_parse_from(["reachmap", "encode", "-i", "g.txt", "-o", "r0"]).is_err());
    }
}
