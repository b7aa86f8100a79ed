//! keysweep - bulk per-key maintenance for Redis-compatible keyspaces
//!
//! Walks every key of a source store and applies the configured operation:
//! migrate, persist, expire, del, or move.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::{error, info};

use keysweep::config::{Args, SweepConfig};
use keysweep::store::RedisStore;
use keysweep::sweep::{Sweep, SweepSummary};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Validation failures halt before any connection is opened.
    let config = match SweepConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.log_file.as_deref()) {
        eprintln!("{} cannot open log file: {}", "error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    // Per-key failures and an early-ended pass are both log-only; only a
    // configuration error exits non-zero.
    match run(config).await {
        Ok(summary) => print_summary(&summary),
        Err(e) => error!("pass ended early: {}", e),
    }
    ExitCode::SUCCESS
}

async fn run(config: SweepConfig) -> anyhow::Result<SweepSummary> {
    info!("connecting to source {}", config.src);
    let src = RedisStore::connect(&config.src, config.connect_timeout).await?;

    info!("connecting to destination {}", config.dst);
    let dst = RedisStore::connect(&config.dst, config.connect_timeout).await?;

    let summary = Sweep::new(src, dst, config).run().await?;
    Ok(summary)
}

fn print_summary(summary: &SweepSummary) {
    println!();
    if summary.failed == 0 {
        println!("{}", "✓ Pass completed.".green().bold());
    } else {
        println!(
            "{}",
            format!("⚠ Pass completed with {} per-key failures.", summary.failed)
                .yellow()
                .bold()
        );
    }
    println!();

    println!("{}", "Sweep Summary".bold().underline());
    println!("  Keys scanned: {}", summary.scanned);
    println!("  Applied:      {}", summary.applied);
    println!("  Skipped:      {}", summary.skipped);
    println!("  Failed:       {}", summary.failed);
    println!("  Duration:     {:.1}s", summary.elapsed_secs);
    println!();
}

/// Timestamped lines always go to stdout; with `--log` they are also
/// appended to the file, ANSI-free.
fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .init();
        }
    }
    Ok(())
}
