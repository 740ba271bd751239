//! Skimmer main entry point
//!
//! This is the command-line interface for the Skimmer crawling engine.

use anyhow::{Context, Result};
use clap::Parser;
use skimmer::config::{load_config_with_hash, Config};
use skimmer::output::{
    generate_markdown_summary, generate_report, load_statistics, print_statistics,
};
use skimmer::storage::open_storage;
use skimmer::{canonicalize, Coordinator};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Skimmer: an asynchronous crawling engine
///
/// Skimmer fetches seed resources, follows the links it finds in them up to
/// a depth limit, and stores everything it fetched in a SQLite database.
/// Transient failures are retried with exponential backoff.
#[derive(Parser, Debug)]
#[command(name = "skimmer")]
#[command(version)]
#[command(about = "An asynchronous crawling engine", long_about = None)]
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

    /// Additional seed URL (may be repeated)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Number of independent crawl passes to run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    passes: u32,

    /// Pause between passes, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    interval: u64,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let seeds: Vec<String> = config.seeds.iter().chain(&cli.seeds).cloned().collect();

    if cli.dry_run {
        handle_dry_run(&config, &seeds);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(config, config_hash, seeds, cli.passes, cli.interval).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("skimmer=info,warn"),
            1 => EnvFilter::new("skimmer=debug,info"),
            2 => EnvFilter::new("skimmer=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration and seeds
fn handle_dry_run(config: &Config, seeds: &[String]) {
    println!("=== Skimmer Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Max concurrency: {}", crawler.max_concurrency);
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Max attempts: {}", crawler.max_attempts);
    println!("  Fetch timeout: {}ms", crawler.timeout_ms);
    println!(
        "  Backoff: {}ms base, {}ms cap",
        crawler.backoff_base_ms, crawler.backoff_cap_ms
    );
    println!("  Shutdown grace: {}ms", crawler.shutdown_grace_ms);
    match crawler.max_links_per_page {
        Some(limit) => println!("  Max links per page: {}", limit),
        None => println!("  Max links per page: unlimited"),
    }
    println!("  Abort on write error: {}", crawler.abort_on_write_error);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);
    if let Some(dir) = &config.output.artifact_dir {
        println!("  Artifact files: {}", dir);
    }

    println!("\nSeeds ({}):", seeds.len());
    for seed in seeds {
        let id = canonicalize(seed);
        if id.is_malformed() {
            println!("  - {} (malformed, will fail)", seed);
        } else {
            println!("  - {}", id);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: writes the markdown summary of the latest run
fn handle_export_summary(config: &Config) -> Result<()> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;

    tracing::info!("Loading latest run from database...");
    let report = generate_report(&storage)?;
    generate_markdown_summary(&report, Path::new(&config.output.summary_path))
        .context("failed to write summary")?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    seeds: Vec<String>,
    passes: u32,
    interval: u64,
) -> Result<()> {
    let coordinator = Coordinator::new(config)
        .context("failed to set up crawler")?
        .with_config_hash(config_hash);

    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping crawl");
            cancel.cancel();
        }
    });

    tracing::info!("Total seed URLs: {}", seeds.len());

    for pass in 1..=passes {
        if passes > 1 {
            tracing::info!("Starting pass {} of {}", pass, passes);
        }

        let summary = coordinator
            .start(&seeds)
            .await
            .with_context(|| format!("crawl pass {} failed", pass))?;
        println!("{}", summary);

        if coordinator.is_cancelled() || pass == passes {
            break;
        }

        let cancel = coordinator.cancel_handle();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
        }
    }

    Ok(())
}
