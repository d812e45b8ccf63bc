use crate::config::{load_config, Config};
use crate::output::{dedup_file, write_output, ResultAggregator};
use crate::scheduler::{run_scheduler, RunSummary};
use crate::service::{CloudWatchService, QueryService};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    #[error("output error: {0}")]
    Output(#[from] crate::output::OutputError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            for path in crate::config::default_config_paths() {
                eprintln!("  {}", path.display());
            }
            eprintln!("\nUse --config <path> to specify a config file, or run 'logspan config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_export(&config_path).await.map_err(|e| e.into())
}

async fn run_export(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    info!(
        region = %config.query.region,
        log_group = %config.query.log_group_name,
        "Connecting to CloudWatch Logs"
    );
    let service = Arc::new(CloudWatchService::connect(&config.query).await);

    let output_path = export(service, &config).await?;
    info!(path = %output_path.display(), "Export complete");
    Ok(())
}

/// Query the configured range through `service`, write the CSV and run the
/// optional dedup pass. Returns the path of the unfiltered output file.
pub async fn export(service: Arc<dyn QueryService>, config: &Config) -> Result<PathBuf, RunError> {
    let started = Instant::now();
    let range = config.query.time_range()?;
    let aggregator = Arc::new(ResultAggregator::new());

    info!(range = %range, "Starting export");
    let summary: RunSummary = run_scheduler(
        service,
        Arc::clone(&aggregator),
        range,
        config.scheduler.clone(),
    )
    .await?;

    let output_path = write_output(&aggregator, &config.output.directory, Utc::now())?;

    if let Some(column) = &config.output.filter_column_name {
        match dedup_file(&output_path, column) {
            Ok(report) => info!(
                path = %report.output_path.display(),
                duplicates_removed = report.duplicates_removed,
                "Filtered duplicate rows"
            ),
            Err(e) => warn!(error = %e, "Skipping duplicate filtering"),
        }
    }

    info!(
        elapsed = ?started.elapsed(),
        windows = summary.windows_completed,
        splits = summary.windows_split,
        records_matched = summary.records_matched,
        records_scanned = summary.records_scanned,
        "Execution stats"
    );

    Ok(output_path)
}
