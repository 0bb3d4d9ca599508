//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest scraper.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, select_categories, Config};
use catalog_harvest::harvest::run_harvest;
use catalog_harvest::output::{persist_results, print_statistics, HarvestStatistics};
use catalog_harvest::storage::{open_store, OutcomeStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a rate-limited, page-distributed catalog scraper
///
/// Catalog-Harvest discovers how many pages each configured category spans,
/// fetches them with a bounded pool of workers under one global request
/// budget, and stores the extracted listings per run.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version)]
#[command(about = "A rate-limited, page-distributed catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,

    /// Harvest only the named categories
    #[arg(long, value_name = "ID", num_args = 1..)]
    only: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if !cli.only.is_empty() {
        select_categories(&mut config, &cli.only)?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_harvest(config, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated plan
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Workers per category: {}", config.harvest.workers);
    println!("  Categories at a time: {}", config.harvest.outer_concurrency);
    println!(
        "  Requests per minute: {}",
        config.harvest.requests_per_minute
    );
    println!("  Page timeout: {}s", config.harvest.page_timeout_secs);
    println!(
        "  Max concurrent sessions: {}",
        config.harvest.workers * config.harvest.outer_concurrency
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nCategories ({}):", config.categories.len());
    for entry in &config.categories {
        if entry.proxies.is_empty() {
            println!("  - {} ({}, direct)", entry.id, entry.url);
        } else {
            println!(
                "  - {} ({}, {} proxies)",
                entry.id,
                entry.url,
                entry.proxies.len()
            );
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let mut store = open_store(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open {}", config.output.database_path))?;
    let run_id = store.create_run(config_hash)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling harvest");
            interrupt.cancel();
        }
    });

    tracing::info!(
        "Starting run {} with {} categories",
        run_id,
        config.categories.len()
    );
    let results = run_harvest(&config, cancel.clone()).await?;

    persist_results(&mut store, run_id, &results, cancel.is_cancelled())?;
    print_statistics(&HarvestStatistics::from_results(&results));

    Ok(())
}
