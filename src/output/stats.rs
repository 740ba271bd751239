//! Statistics generation from the run database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::SkimmerError;

/// Database-wide crawl statistics
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of recorded runs
    pub total_runs: u64,

    /// Artifacts stored across all runs
    pub total_artifacts: u64,

    /// Distinct domains among stored artifacts
    pub unique_domains: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(SkimmerError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, SkimmerError> {
    Ok(CrawlStatistics {
        total_runs: storage.count_runs()?,
        total_artifacts: storage.count_artifacts(None)?,
        unique_domains: storage.count_unique_domains(None)?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Runs recorded: {}", stats.total_runs);
    println!("  Artifacts stored: {}", stats.total_artifacts);
    println!("  Unique domains: {}", stats.unique_domains);
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No crawl runs recorded yet.");
        return;
    };

    let summary = &run.summary;
    println!("Latest Run (#{}, {}):", run.id, run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Discovered: {}", summary.total_discovered);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Abandoned: {}", summary.abandoned);
    println!("  Cancelled: {}", summary.cancelled);
    println!("  Retries: {}", summary.retries);
    println!();

    if summary.abandoned > 0 {
        let failures = &summary.failures;
        println!("Failure Summary:");
        println!("  Malformed identifier: {}", failures.malformed_identifier);
        println!("  Permanent fetch failure: {}", failures.permanent_fetch);
        println!("  Retries exhausted: {}", failures.retry_exhausted);
        println!("  Persistence failure: {}", failures.persistence);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} finished tasks)",
        summary.success_rate(),
        summary.succeeded,
        summary.finished()
    );
}
