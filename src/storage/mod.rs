//! Storage module for persisting crawl output
//!
//! This module handles everything that leaves the engine:
//! - The [`ArtifactSink`] persistence seam and its implementations
//!   (SQLite, files on disk, in-memory, fan-out)
//! - The SQLite run database with its schema and reporting queries

mod files;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use files::{extension_for, file_name_for, FileSink};
pub use memory::{FanoutSink, MemorySink};
pub use sqlite::{init_database, SqliteSink, SqliteStorage};
pub use traits::{ArtifactSink, Storage, StorageError, StorageResult};

use crate::output::CrawlSummary;
use crate::url::ResourceId;
use crate::SkimmerError;
use chrono::{DateTime, Utc};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SkimmerError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SkimmerError> {
    SqliteStorage::new(path)
}

/// The persisted result of one successful fetch + extract
///
/// An artifact is moved into the sink; the engine keeps no reference to it
/// afterwards.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ResourceId,
    pub parent: Option<ResourceId>,
    pub depth: u32,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    /// Set when extraction could not interpret the body
    pub diagnostic: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Artifact {
    /// Creates an artifact for a root resource with no title or diagnostic
    pub fn new(id: ResourceId, content: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            id,
            parent: None,
            depth: 0,
            content,
            content_type,
            title: None,
            diagnostic: None,
            fetched_at: Utc::now(),
        }
    }

    /// Records where in the crawl graph this artifact was found
    pub fn with_lineage(mut self, parent: Option<ResourceId>, depth: u32) -> Self {
        self.parent = parent;
        self.depth = depth;
        self
    }
}

/// Represents a stored artifact row
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub id: i64,
    pub run_id: i64,
    pub url: String,
    pub domain: Option<String>,
    pub parent_url: Option<String>,
    pub depth: u32,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub body_size: u64,
    pub diagnostic: Option<String>,
    pub fetched_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    /// Final counts; all zero while the run is still `running`
    pub summary: CrawlSummary,
}

impl RunRecord {
    /// Wall-clock seconds between start and finish, when both are known
    pub fn duration_seconds(&self) -> Option<i64> {
        let started = self.started_at.parse::<DateTime<Utc>>().ok()?;
        let finished = self.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
        Some((finished - started).num_seconds())
    }
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
