//! lot-harvest main entry point
//!
//! This is the command-line interface for the lot-harvest auction crawler.

use anyhow::Context;
use clap::Parser;
use lot_harvest::config::{resolve_config, Config, ConfigOverrides};
use lot_harvest::crawler::{crawl, Shutdown};
use lot_harvest::output::{load_statistics, print_statistics};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Execution log file name inside the output directory
const EXECUTION_LOG_FILE: &str = "crawler.log";

/// lot-harvest: a polite, resumable auction-listing crawler
///
/// Discovers the auctions listed on the site's landing page and harvests
/// their lots, preferring the site's own JSON endpoints and falling back to
/// the HTML lot cards. Progress is checkpointed per page; rerunning with the
/// same output directory resumes where the last run stopped.
#[derive(Parser, Debug)]
#[command(name = "lot-harvest")]
#[command(version)]
#[command(about = "A polite, resumable auction-listing crawler", long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Directory for raw records, checkpoint, logs and consolidated outputs
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Landing page listing the auctions
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Request ceiling in requests per second
    #[arg(long, value_name = "RPS")]
    rate_limit: Option<f64>,

    /// Crawl at most this many auctions
    #[arg(long, value_name = "N")]
    max_auctions: Option<usize>,

    /// Crawl at most this many pages per auction
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Read at most two pages per auction
    #[arg(long)]
    dry_run: bool,

    /// Prefer a headless rendering engine
    #[arg(long)]
    headless: bool,

    /// Print the effective configuration and exit
    #[arg(long, conflicts_with = "stats")]
    show_config: bool,

    /// Show statistics from the output directory and exit
    #[arg(long, conflicts_with = "show_config")]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            output_dir: self.output_dir.clone(),
            rate_limit: self.rate_limit,
            max_auctions: self.max_auctions,
            max_pages: self.max_pages,
            dry_run: self.dry_run,
            headless: self.headless,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = resolve_config(cli.config.as_deref(), cli.overrides())
        .context("failed to load configuration")?;

    if cli.show_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if cli.stats {
        setup_logging(cli.verbose, cli.quiet, None)?;
        return handle_stats(&config);
    }

    setup_logging(
        cli.verbose,
        cli.quiet,
        Some(&config.output.output_dir.join(EXECUTION_LOG_FILE)),
    )?;

    handle_crawl(config).await
}

/// Sets up logging to stderr and, when given, to the execution log file
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lot_harvest=info,warn"),
            1 => EnvFilter::new("lot_harvest=debug,info"),
            2 => EnvFilter::new("lot_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Handles the --stats mode: shows statistics from the output directory
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let output_dir = &config.output.output_dir;
    println!("Output directory: {}\n", output_dir.display());

    let stats = load_statistics(output_dir)
        .with_context(|| format!("failed to read {}", output_dir.display()))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} at {} req/s into {}{}",
        config.crawler.base_url,
        config.crawler.rate_limit,
        config.output.output_dir.display(),
        if config.crawler.dry_run { " (dry run)" } else { "" }
    );

    if config.crawler.headless {
        tracing::warn!("No headless engine is available; rendering pages over plain HTTP");
    }

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the current commit and stopping");
            signal.trigger();
        }
    });

    match crawl(config, shutdown).await {
        Ok(report) => {
            if report.interrupted {
                tracing::warn!(
                    "Run interrupted; {} auction(s) handled. Rerun with the same output directory to resume",
                    report.auctions.len()
                );
            } else {
                tracing::info!("Harvest completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
