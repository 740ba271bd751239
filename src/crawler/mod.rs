//! Crawler module for fetching resources and following what they link to
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with outcome classification
//! - Retry decisions with exponential backoff
//! - HTML parsing and link extraction
//! - Concurrency-bounded scheduling
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod retry;
mod scheduler;
mod task;

pub use coordinator::Coordinator;
pub use extractor::{parse_html, Extraction, Extractor, HtmlExtractor, ParsedPage};
pub use fetcher::{
    build_http_client, classify_status, FailureReason, FetchResult, FetchedContent, Fetcher,
    HttpFetcher,
};
pub use retry::{Failure, FailureKind, RetryDecision, RetryPolicy};
pub use scheduler::Scheduler;
pub use task::CrawlTask;

use crate::config::Config;
use crate::output::CrawlSummary;
use crate::SkimmerError;

/// Runs a complete crawl from the seeds in `config`
///
/// This is the main entry point for a one-shot crawl. It will:
/// 1. Open the run database and record a new run
/// 2. Build the HTTP client and persistence sinks
/// 3. Fetch seeds, extract links and follow them to the depth limit
/// 4. Record the outcome and write the markdown summary
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The crawl finished or was cancelled
/// * `Err(SkimmerError)` - Setup failed, or the crawl aborted
pub async fn crawl(config: Config) -> Result<CrawlSummary, SkimmerError> {
    let seeds = config.seeds.clone();
    let coordinator = Coordinator::new(config)?;
    coordinator.start(seeds).await
}
