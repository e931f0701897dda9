mod commands;
mod logging;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "scout-sync",
    version,
    about = "Incremental Odoo POS to Supabase bronze sync"
)]
struct Cli {
    /// Path to a sync YAML file (default: configure from the environment)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore the stored checkpoint and resync from the beginning
    #[arg(long)]
    full: bool,

    /// Extract and transform only: no writes, no checkpoint advance
    #[arg(long)]
    dry_run: bool,

    /// Orders per extraction page and records per sink batch
    #[arg(long)]
    batch_size: Option<NonZeroUsize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let args = commands::run::RunArgs {
        config: cli.config,
        full_resync: cli.full,
        dry_run: cli.dry_run,
        batch_size: cli.batch_size.map(NonZeroUsize::get),
    };
    match commands::run::execute(&args).await {
        Ok(outcome) if outcome.is_ok() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from([
            "scout-sync",
            "--full",
            "--dry-run",
            "--batch-size",
            "100",
            "--config",
            "sync.yaml",
        ]);
        assert!(cli.full);
        assert!(cli.dry_run);
        assert_eq!(cli.batch_size.map(NonZeroUsize::get), Some(100));
        assert_eq!(cli.config, Some(PathBuf::from("sync.yaml")));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn defaults_run_incrementally_from_env() {
        let cli = Cli::parse_from(["scout-sync"]);
        assert!(!cli.full);
        assert!(!cli.dry_run);
        assert_eq!(cli.batch_size, None);
        assert!(cli.config.is_none());
    }

    #[test]
    fn batch_size_must_be_numeric() {
        assert!(Cli::try_parse_from(["scout-sync", "--batch-size", "many"]).is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(Cli::try_parse_from(["scout-sync", "--batch-size", "0"]).is_err());
    }
}
