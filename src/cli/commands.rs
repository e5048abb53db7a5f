//! Command implementations

use crate::bfs::{
    run_single_round, ConvergedSnapshot, ExtractSummary, Extractor, LocalRound, Orchestrator,
    RunSummary,
};
use crate::config::JobConfig;
use crate::error::ReachError;
use crate::graph::{encode_graph, NodeId};
use crate::runtime::{store, RoundStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const ROUNDS_DIR: &str = "rounds";
pub const REACHABLE_DIR: &str = "reachable";
pub const SUMMARY_FILE: &str = "summary.json";

/// Contents of `summary.json` written by `run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run: RunSummary,
    pub extract: ExtractSummary,
}

pub async fn run_encode(input: &Path, output: &Path, sources: &[NodeId], config: &JobConfig) -> Result<()> {
    let manifest = encode_graph(input, output, sources, config.partitions).await?;
    println!(
        "Encoded {} node(s) ({} source(s)) into {} partition(s) at {}",
        manifest.nodes,
        manifest.reached,
        manifest.partitions,
        output.display()
    );
    Ok(())
}

pub async fn run_iterate(input: &Path, output: &Path, config: &JobConfig) -> Result<()> {
    ensure_output_outside_input(input, output).await?;
    let executor = LocalRound::new(config);
    let summary = run_single_round(&executor, input, output).await?;

    let changed = summary
        .changed
        .map_or_else(|| "unknown".to_string(), |n| n.to_string());
    println!(
        "Round {}: {} changed, {} of {} reached{}",
        summary.round,
        changed,
        summary.reached,
        summary.nodes,
        if summary.converged { " (converged)" } else { "" }
    );
    Ok(())
}

pub async fn run_job(input: &Path, output: &Path, sources: &[NodeId], config: &JobConfig) -> Result<()> {
    ensure_output_outside_input(input, output).await?;
    store::prepare_dir(output).await?;
    let rounds = RoundStore::new(output.join(ROUNDS_DIR));
    encode_graph(input, &rounds.round_dir(0), sources, config.partitions).await?;

    let orchestrator = Orchestrator::new(LocalRound::new(config), rounds, config.clone());
    let completed = orchestrator.run().await?;

    let extractor = Extractor::new(config.task_pool());
    let extract = extractor
        .run(&completed.snapshot, &output.join(REACHABLE_DIR))
        .await?;

    let report = RunReport {
        run: completed.summary,
        extract,
    };
    write_report(&output.join(SUMMARY_FILE), &report).await?;

    println!(
        "Converged after {} round(s): {} of {} node(s) reachable",
        report.run.rounds_executed, report.extract.reachable, report.run.nodes
    );
    println!("Reachable nodes: {}", output.join(REACHABLE_DIR).display());
    Ok(())
}

pub async fn run_extract(input: &Path, output: &Path, config: &JobConfig) -> Result<()> {
    ensure_output_outside_input(input, output).await?;
    let snapshot = ConvergedSnapshot::open(input).await?;
    let summary = Extractor::new(config.task_pool())
        .run(&snapshot, output)
        .await?;

    println!(
        "{} of {} node(s) reachable, written to {} shard(s) in {}",
        summary.reachable,
        summary.scanned,
        summary.shards,
        output.display()
    );
    Ok(())
}

/// Outputs are cleared before anything is written, so an output that is, or
/// contains, the input would destroy the input first.
async fn ensure_output_outside_input(input: &Path, output: &Path) -> Result<(), ReachError> {
    // Paths that do not exist yet cannot overlap anything on disk.
    let (Ok(input), Ok(output)) = (
        tokio::fs::canonicalize(input).await,
        tokio::fs::canonicalize(output).await,
    ) else {
        return Ok(());
    };

    if input.starts_with(&output) {
        return Err(ReachError::config(format!(
            "output {} would overwrite input {}",
            output.display(),
            input.display()
        )));
    }
    Ok(())
}

async fn write_report(path: &Path, report: &RunReport) -> Result<(), ReachError> {
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| ReachError::io(path, std::io::Error::other(e)))?;
    store::write_atomic(path, &json)
        .await
        .map_err(|e| ReachError::io(path, e))?;
    info!("Wrote run summary to {}", path.display());
    Ok(())
}
