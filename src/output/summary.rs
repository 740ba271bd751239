//! Summary types shared by the scheduler and the report writers

use crate::crawler::FailureKind;
use crate::storage::RunRecord;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("No crawl runs found in database")]
    NoRuns,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Abandoned tasks broken down by the reason they were given up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounts {
    pub malformed_identifier: u64,
    pub permanent_fetch: u64,
    pub retry_exhausted: u64,
    pub persistence: u64,
}

impl FailureCounts {
    /// Counts one abandoned task under `kind`
    pub fn record(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::MalformedIdentifier => self.malformed_identifier += 1,
            FailureKind::PermanentFetch => self.permanent_fetch += 1,
            FailureKind::RetryableFetch | FailureKind::RetryExhausted => {
                self.retry_exhausted += 1
            }
            FailureKind::Persistence => self.persistence += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.malformed_identifier + self.permanent_fetch + self.retry_exhausted + self.persistence
    }
}

/// Outcome of one crawl session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    /// Tasks whose artifact was stored
    pub succeeded: u64,

    /// Tasks given up on; always equal to `failures.total()`
    pub abandoned: u64,

    /// Unique identifiers admitted, seeds included
    pub total_discovered: u64,

    /// Admitted tasks left unfinished because the session was cancelled
    pub cancelled: u64,

    /// Retry delays scheduled across all tasks
    pub retries: u64,

    pub failures: FailureCounts,
    pub elapsed: Duration,
    pub was_cancelled: bool,
}

impl CrawlSummary {
    /// Creates a new empty crawl summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an abandoned task
    pub fn record_abandoned(&mut self, kind: FailureKind) {
        self.abandoned += 1;
        self.failures.record(kind);
    }

    /// Tasks that reached a terminal state
    pub fn finished(&self) -> u64 {
        self.succeeded + self.abandoned
    }

    /// Returns the success rate as a percentage of finished tasks
    pub fn success_rate(&self) -> f64 {
        let finished = self.finished();
        if finished == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / finished as f64) * 100.0
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} abandoned, {} cancelled, {} discovered, {} retries in {:.2}s",
            self.succeeded,
            self.abandoned,
            self.cancelled,
            self.total_discovered,
            self.retries,
            self.elapsed.as_secs_f64()
        )
    }
}

/// A finished run together with what the database knows about its artifacts
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunRecord,
    pub artifacts_stored: u64,
    pub unique_domains: u64,
    /// Depth -> stored artifact count
    pub depth_breakdown: HashMap<u32, u64>,
    pub discovered_domains: Vec<String>,
}
