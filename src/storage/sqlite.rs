//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait,
//! and [`SqliteSink`], which feeds it from the asynchronous scheduler.

use crate::output::{CrawlSummary, FailureCounts};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArtifactSink, Storage, StorageError, StorageResult};
use crate::storage::{Artifact, ArtifactRecord, RunRecord, RunStatus};
use crate::url::extract_domain;
use crate::SkimmerError;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, succeeded, abandoned,
     discovered, cancelled, retries, malformed_identifier, permanent_fetch, retry_exhausted,
     persistence, elapsed_ms";

const ARTIFACT_COLUMNS: &str = "id, run_id, url, domain, parent_url, depth, content_type, title,
     body_size, diagnostic, fetched_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SkimmerError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SkimmerError> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, SkimmerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status = RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running);
    let count = |idx: usize| -> rusqlite::Result<u64> { Ok(row.get::<_, i64>(idx)? as u64) };

    let summary = CrawlSummary {
        succeeded: count(5)?,
        abandoned: count(6)?,
        total_discovered: count(7)?,
        cancelled: count(8)?,
        retries: count(9)?,
        failures: FailureCounts {
            malformed_identifier: count(10)?,
            permanent_fetch: count(11)?,
            retry_exhausted: count(12)?,
            persistence: count(13)?,
        },
        elapsed: Duration::from_millis(count(14)?),
        was_cancelled: status == RunStatus::Interrupted,
    };

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status,
        summary,
    })
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
    Ok(ArtifactRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        url: row.get(2)?,
        domain: row.get(3)?,
        parent_url: row.get(4)?,
        depth: row.get(5)?,
        content_type: row.get(6)?,
        title: row.get(7)?,
        body_size: row.get::<_, i64>(8)? as u64,
        diagnostic: row.get(9)?,
        fetched_at: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &CrawlSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, succeeded = ?3, abandoned = ?4,
             discovered = ?5, cancelled = ?6, retries = ?7, malformed_identifier = ?8,
             permanent_fetch = ?9, retry_exhausted = ?10, persistence = ?11, elapsed_ms = ?12
             WHERE id = ?13",
            params![
                status.to_db_string(),
                now,
                summary.succeeded as i64,
                summary.abandoned as i64,
                summary.total_discovered as i64,
                summary.cancelled as i64,
                summary.retries as i64,
                summary.failures.malformed_identifier as i64,
                summary.failures.permanent_fetch as i64,
                summary.failures.retry_exhausted as i64,
                summary.failures.persistence as i64,
                summary.elapsed.as_millis() as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Artifacts =====

    fn insert_artifact(&mut self, run_id: i64, artifact: &Artifact) -> StorageResult<()> {
        let domain = extract_domain(&artifact.id);
        let parent = artifact.parent.as_ref().map(|p| p.as_str());

        self.conn.execute(
            "INSERT INTO artifacts (run_id, url, domain, parent_url, depth, content_type, title,
             body, body_size, diagnostic, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run_id,
                artifact.id.as_str(),
                domain,
                parent,
                artifact.depth,
                artifact.content_type,
                artifact.title,
                artifact.content,
                artifact.content.len() as i64,
                artifact.diagnostic,
                artifact.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_artifact(&self, run_id: i64, url: &str) -> StorageResult<Option<ArtifactRecord>> {
        let sql = format!(
            "SELECT {} FROM artifacts WHERE run_id = ?1 AND url = ?2",
            ARTIFACT_COLUMNS
        );
        let artifact = self
            .conn
            .query_row(&sql, params![run_id, url], artifact_from_row)
            .optional()?;
        Ok(artifact)
    }

    // ===== Statistics =====

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_artifacts(&self, run_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE ?1 IS NULL OR run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_unique_domains(&self, run_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT domain) FROM artifacts WHERE ?1 IS NULL OR run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM artifacts WHERE run_id = ?1 GROUP BY depth ORDER BY depth",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }

        Ok(breakdown)
    }

    fn get_discovered_domains(&self, run_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT domain FROM artifacts
             WHERE run_id = ?1 AND domain IS NOT NULL
             ORDER BY domain",
        )?;
        let domains = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(domains)
    }
}

/// Persistence sink writing artifacts into the `artifacts` table of a run
///
/// SQLite access is synchronous, so each insert runs on the blocking pool
/// behind a shared mutex.
#[derive(Clone)]
pub struct SqliteSink {
    storage: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
}

impl SqliteSink {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, run_id: i64) -> Self {
        Self { storage, run_id }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }
}

#[async_trait]
impl ArtifactSink for SqliteSink {
    async fn store(&self, artifact: Artifact) -> StorageResult<()> {
        let storage = Arc::clone(&self.storage);
        let run_id = self.run_id;
        let url = artifact.id.to_string();

        tokio::task::spawn_blocking(move || {
            let mut storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            storage.insert_artifact(run_id, &artifact)
        })
        .await
        .map_err(|e| StorageError::Write {
            url,
            message: e.to_string(),
        })?
    }
}

/// Initializes or opens a database at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
