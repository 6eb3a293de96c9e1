//! Command implementation for the lcfit CLI
//!
//! Sets up logging, builds the configuration from arguments and runs the
//! fitting pipeline, then prints a summary.

use crate::cli::args::Args;
use crate::models::RunStats;
use crate::processor::FitProcessor;
use anyhow::{Context, Result};
use colored::*;
use indicatif::HumanDuration;
use std::time::Duration;
use tracing::debug;

/// Run one fitting job described by `args`
pub fn run(args: Args) -> Result<RunStats> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config = args
        .into_config()
        .context("Failed to build configuration")?;
    debug!("Configuration: {:?}", config);

    let processor = FitProcessor::new(config)?;
    let stats = processor.process()?;

    print_summary(&stats);
    Ok(stats)
}

/// Set up structured logging to stderr
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lcfit={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn print_summary(stats: &RunStats) {
    let failed = stats.data_quality_failures + stats.runtime_failures;

    println!("\n{}", "Fitting complete".bright_green().bold());
    println!("  Light curves read: {}", stats.objects_read);
    println!(
        "  Successful fits: {}",
        stats.fits_succeeded.to_string().bright_white().bold()
    );
    if failed > 0 {
        println!(
            "  {} {} ({} data quality, {} runtime)",
            "Failed fits:".yellow(),
            failed,
            stats.data_quality_failures,
            stats.runtime_failures
        );
    }
    println!(
        "  Processing time: {}",
        HumanDuration(Duration::from_millis(stats.processing_time_ms as u64))
    );
}
