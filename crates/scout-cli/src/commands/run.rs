use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use scout_engine::config::{parser, SyncConfig};
use scout_engine::result::RefreshStatus;
use scout_engine::{orchestrator, ExecutionOptions, SyncOutcome};

/// Errors printed in the summary; the run log keeps the rest.
const SHOWN_ERRORS: usize = 5;

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub full_resync: bool,
    pub dry_run: bool,
    pub batch_size: Option<usize>,
}

/// Execute a sync run: load configuration, run once, print the summary.
pub async fn execute(args: &RunArgs) -> Result<SyncOutcome> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    let config = load_config(args)?;
    tracing::info!(
        stream = config.stream,
        source = config.source.base_url,
        sink = config.sink.url,
        state = ?config.state.backend,
        "Configuration loaded"
    );

    let options = ExecutionOptions {
        full_resync: args.full_resync,
        dry_run: args.dry_run,
        batch_size: args.batch_size,
    };
    let outcome = orchestrator::run_sync(&config, &options).await;
    print_summary(&outcome);
    Ok(outcome)
}

fn load_config(args: &RunArgs) -> Result<SyncConfig> {
    match &args.config {
        Some(path) => parser::parse_config(path)
            .with_context(|| format!("Failed to load sync config: {}", path.display())),
        None => parser::config_from_env().context("Failed to configure from environment"),
    }
}

fn print_summary(outcome: &SyncOutcome) {
    println!("Sync '{}' finished: {}", outcome.stream, outcome.status);
    println!("  Started:      {}", format_time(outcome.started_at));
    println!("  Completed:    {}", format_time(outcome.completed_at));
    println!("  Fetched:      {}", outcome.counts.fetched);
    println!("  Transformed:  {}", outcome.counts.transformed);
    println!("  Loaded:       {}", outcome.counts.loaded);
    println!("  Watermark:    {}", format_watermark(outcome.watermark_after));
    for refresh in &outcome.refresh {
        let status = match &refresh.status {
            RefreshStatus::Refreshed => "OK".to_string(),
            RefreshStatus::Failed(e) => format!("FAILED ({e})"),
            RefreshStatus::Skipped => "SKIPPED".to_string(),
        };
        println!("  Refresh {}: {status}", refresh.layer);
    }
    println!("  Errors:       {}", outcome.error_count);
    for error in outcome.errors.iter().take(SHOWN_ERRORS) {
        println!("    - {error}");
    }
    let hidden = usize::try_from(outcome.error_count)
        .unwrap_or(usize::MAX)
        .saturating_sub(SHOWN_ERRORS);
    if hidden > 0 {
        println!("    ... and {hidden} more");
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_watermark(watermark: Option<DateTime<Utc>>) -> String {
    watermark.map_or_else(|| "none".to_string(), format_time)
}
