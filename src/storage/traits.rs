//! Storage traits and error types
//!
//! This module defines the two storage seams of the crawler:
//! - [`ArtifactSink`], the asynchronous persistence sink the scheduler hands
//!   every extracted artifact to
//! - [`Storage`], the synchronous run database used for bookkeeping and
//!   reporting

use crate::output::CrawlSummary;
use crate::storage::{Artifact, ArtifactRecord, RunRecord, RunStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Write failed for {url}: {message}")]
    Write { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for extracted artifacts
///
/// Implementations must accept concurrent `store` calls for distinct
/// identifiers. The engine never stores the same identifier twice in one
/// session, so behavior for concurrent stores of one identifier is unspecified.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Durably stores an artifact, taking ownership of it
    async fn store(&self, artifact: Artifact) -> StorageResult<()>;
}

/// Trait for run database implementations
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status and summary counts of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &CrawlSummary,
    ) -> StorageResult<()>;

    // ===== Artifacts =====

    /// Inserts an artifact produced during a run
    fn insert_artifact(&mut self, run_id: i64, artifact: &Artifact) -> StorageResult<()>;

    /// Gets an artifact by run and canonical URL
    fn get_artifact(&self, run_id: i64, url: &str) -> StorageResult<Option<ArtifactRecord>>;

    // ===== Statistics =====

    /// Counts all recorded runs
    fn count_runs(&self) -> StorageResult<u64>;

    /// Counts stored artifacts, optionally restricted to one run
    fn count_artifacts(&self, run_id: Option<i64>) -> StorageResult<u64>;

    /// Counts distinct domains among stored artifacts, optionally for one run
    fn count_unique_domains(&self, run_id: Option<i64>) -> StorageResult<u64>;

    /// Gets artifact count breakdown by depth for a run
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, u64>>;

    /// Gets the sorted list of domains with stored artifacts for a run
    fn get_discovered_domains(&self, run_id: i64) -> StorageResult<Vec<String>>;
}
