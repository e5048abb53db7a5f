//! Command routing and execution

use crate::cli::args::{Commands, JobArgs};
use crate::cli::commands::{run_encode, run_extract, run_iterate, run_job};
use crate::config::JobConfig;
use anyhow::Result;

async fn resolve_config(job: &JobArgs) -> Result<JobConfig> {
    Ok(JobConfig::resolve(job.config.as_deref(), job.overrides()).await?)
}

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Encode {
            input,
            output,
            sources,
            job,
        } => {
            let config = resolve_config(&job).await?;
            run_encode(&input, &output, &sources, &config).await
        }
        Commands::Iterate { input, output, job } => {
            let config = resolve_config(&job).await?;
            run_iterate(&input, &output, &config).await
        }
        Commands::Run {
            input,
            output,
            sources,
            job,
        } => {
            let config = resolve_config(&job).await?;
            run_job(&input, &output, &sources, &config).await
        }
        Commands::Extract { input, output, job } => {
            let config = resolve_config(&job).await?;
            run_extract(&input, &output, &config).await
        }
    }
}
