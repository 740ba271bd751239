//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl runs,
//! including outcome counts, the failure breakdown, and discovered domains.

use crate::output::summary::{OutputResult, RunReport};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const MAX_LISTED_DOMAINS: usize = 50;

/// Generates a markdown summary of a run
///
/// # Arguments
///
/// * `report` - The run report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(report: &RunReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_summary(report: &RunReport) -> String {
    let run = &report.run;
    let summary = &run.summary;
    let mut md = String::new();

    md.push_str("# Skimmer Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", run.id));
    md.push_str(&format!("- **Started**: {}\n", run.started_at));
    if let Some(finished) = &run.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    md.push_str(&format!(
        "- **Elapsed**: {:.2} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", run.config_hash));

    md.push_str("## Outcome\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Discovered | {} |\n", summary.total_discovered));
    md.push_str(&format!("| Succeeded | {} |\n", summary.succeeded));
    md.push_str(&format!("| Abandoned | {} |\n", summary.abandoned));
    md.push_str(&format!("| Cancelled | {} |\n", summary.cancelled));
    md.push_str(&format!("| Retries | {} |\n\n", summary.retries));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!(
        "- **Artifacts Stored**: {}\n",
        report.artifacts_stored
    ));
    md.push_str(&format!(
        "- **Unique Domains**: {}\n\n",
        report.unique_domains
    ));

    if summary.abandoned > 0 {
        let failures = &summary.failures;
        md.push_str("## Failure Breakdown\n\n");
        md.push_str("| Failure | Count |\n");
        md.push_str("|---------|-------|\n");
        md.push_str(&format!(
            "| Malformed identifier | {} |\n",
            failures.malformed_identifier
        ));
        md.push_str(&format!(
            "| Permanent fetch failure | {} |\n",
            failures.permanent_fetch
        ));
        md.push_str(&format!(
            "| Retries exhausted | {} |\n",
            failures.retry_exhausted
        ));
        md.push_str(&format!(
            "| Persistence failure | {} |\n\n",
            failures.persistence
        ));
    }

    if !report.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Artifacts |\n");
        md.push_str("|-------|-----------|\n");

        let mut depths: Vec<_> = report.depth_breakdown.iter().collect();
        depths.sort_by_key(|(d, _)| *d);

        for (depth, count) in depths {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !report.discovered_domains.is_empty() {
        md.push_str("## Discovered Domains\n\n");
        md.push_str(&format!(
            "Total discovered: {}\n\n",
            report.discovered_domains.len()
        ));
        for domain in report.discovered_domains.iter().take(MAX_LISTED_DOMAINS) {
            md.push_str(&format!("- {}\n", domain));
        }
        if report.discovered_domains.len() > MAX_LISTED_DOMAINS {
            md.push_str(&format!(
                "\n... and {} more\n\n",
                report.discovered_domains.len() - MAX_LISTED_DOMAINS
            ));
        } else {
            md.push('\n');
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{CrawlSummary, FailureCounts};
    use crate::storage::{RunRecord, RunStatus};
    use std::collections::HashMap;
    use std::time::Duration;

    fn create_test_report() -> RunReport {
        RunReport {
            run: RunRecord {
                id: 1,
                started_at: "2024-01-01T00:00:00Z".to_string(),
                finished_at: Some("2024-01-01T00:01:00Z".to_string()),
                config_hash: "abc123".to_string(),
                status: RunStatus::Completed,
                summary: CrawlSummary {
                    succeeded: 900,
                    abandoned: 100,
                    total_discovered: 1000,
                    cancelled: 0,
                    retries: 42,
                    failures: FailureCounts {
                        malformed_identifier: 10,
                        permanent_fetch: 70,
                        retry_exhausted: 20,
                        persistence: 0,
                    },
                    elapsed: Duration::from_secs(60),
                    was_cancelled: false,
                },
            },
            artifacts_stored: 900,
            unique_domains: 50,
            depth_breakdown: HashMap::new(),
            discovered_domains: vec![],
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_report());

        assert!(markdown.contains("# Skimmer Crawl Summary"));
        assert!(markdown.contains("- **Run ID**: 1"));
        assert!(markdown.contains("- **Status**: completed"));
        assert!(markdown.contains("| Discovered | 1000 |"));
        assert!(markdown.contains("| Succeeded | 900 |"));
        assert!(markdown.contains("Success Rate**: 90.00%"));
    }

    #[test]
    fn test_failure_breakdown_only_when_abandoned() {
        let report = create_test_report();
        let markdown = format_markdown_summary(&report);
        assert!(markdown.contains("| Permanent fetch failure | 70 |"));

        let mut clean = report;
        clean.run.summary.abandoned = 0;
        clean.run.summary.failures = FailureCounts::default();
        assert!(!format_markdown_summary(&clean).contains("Failure Breakdown"));
    }

    #[test]
    fn test_markdown_with_depth_breakdown() {
        let mut report = create_test_report();
        report.depth_breakdown.insert(0, 1);
        report.depth_breakdown.insert(1, 30);
        report.depth_breakdown.insert(2, 869);

        let markdown = format_markdown_summary(&report);

        assert!(markdown.contains("Depth Breakdown"));
        assert!(markdown.contains("| 0 | 1 |\n| 1 | 30 |\n| 2 | 869 |"));
    }

    #[test]
    fn test_markdown_truncates_domain_list() {
        let mut report = create_test_report();
        report.discovered_domains = (0..60).map(|i| format!("site{}.com", i)).collect();

        let markdown = format_markdown_summary(&report);

        assert!(markdown.contains("Total discovered: 60"));
        assert!(markdown.contains("- site49.com"));
        assert!(!markdown.contains("- site50.com"));
        assert!(markdown.contains("... and 10 more"));
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("summary.md");

        generate_markdown_summary(&create_test_report(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Skimmer Crawl Summary"));
    }
}
