//! Output module for crawl summaries and reports
//!
//! This module handles:
//! - The per-session [`CrawlSummary`] the scheduler returns
//! - Markdown reports of finished runs
//! - Database statistics for the CLI

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use summary::{CrawlSummary, FailureCounts, OutputError, OutputResult, RunReport};

use crate::storage::Storage;
use crate::SkimmerError;

/// Builds a report for the most recent run
///
/// # Returns
///
/// * `Ok(RunReport)` - Report of the latest run
/// * `Err(SkimmerError)` - No runs recorded, or a query failed
pub fn generate_report(storage: &dyn Storage) -> Result<RunReport, SkimmerError> {
    let run = storage.get_latest_run()?.ok_or(OutputError::NoRuns)?;
    generate_report_for_run(storage, run.id)
}

/// Builds a report for one run
pub fn generate_report_for_run(
    storage: &dyn Storage,
    run_id: i64,
) -> Result<RunReport, SkimmerError> {
    let run = storage.get_run(run_id)?;

    Ok(RunReport {
        artifacts_stored: storage.count_artifacts(Some(run_id))?,
        unique_domains: storage.count_unique_domains(Some(run_id))?,
        depth_breakdown: storage.get_depth_breakdown(run_id)?,
        discovered_domains: storage.get_discovered_domains(run_id)?,
        run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Artifact, RunStatus, SqliteStorage};
    use crate::url::canonicalize;

    #[test]
    fn test_report_requires_a_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let result = generate_report(&storage);
        assert!(matches!(
            result,
            Err(SkimmerError::Output(OutputError::NoRuns))
        ));
    }

    #[test]
    fn test_report_for_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let old_run = storage.create_run("old").unwrap();
        storage
            .insert_artifact(
                old_run,
                &Artifact::new(canonicalize("https://old.com/"), vec![], None),
            )
            .unwrap();

        let run_id = storage.create_run("new").unwrap();
        let root = canonicalize("https://example.com/");
        storage
            .insert_artifact(run_id, &Artifact::new(root.clone(), vec![], None))
            .unwrap();
        storage
            .insert_artifact(
                run_id,
                &Artifact::new(canonicalize("https://other.org/a"), vec![], None)
                    .with_lineage(Some(root), 1),
            )
            .unwrap();
        storage
            .finish_run(run_id, RunStatus::Completed, &CrawlSummary::default())
            .unwrap();

        let report = generate_report(&storage).unwrap();

        assert_eq!(report.run.id, run_id);
        assert_eq!(report.artifacts_stored, 2);
        assert_eq!(report.unique_domains, 2);
        assert_eq!(report.depth_breakdown.get(&1), Some(&1));
        assert_eq!(
            report.discovered_domains,
            vec!["example.com".to_string(), "other.org".to_string()]
        );
    }
}
