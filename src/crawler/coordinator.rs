//! Crawler coordinator - the control surface of a crawl
//!
//! This module wires a configuration into a running crawl, including:
//! - Opening the run database and recording each run
//! - Building the HTTP fetcher, extractor and persistence sinks
//! - Starting and cancelling crawl sessions
//! - Writing the markdown summary after every run

use crate::config::{validate_crawler_config, Config};
use crate::crawler::extractor::{Extractor, HtmlExtractor};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::scheduler::Scheduler;
use crate::output::{generate_markdown_summary, generate_report_for_run, CrawlSummary};
use crate::storage::{
    ArtifactSink, FanoutSink, FileSink, RunStatus, SqliteSink, SqliteStorage, Storage,
};
use crate::SkimmerError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    config_hash: String,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SkimmerError)` - Invalid settings, or the database or HTTP client
    ///   could not be initialized
    pub fn new(config: Config) -> Result<Self, SkimmerError> {
        validate_crawler_config(&config.crawler)?;

        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        let extractor = HtmlExtractor::with_max_links(config.crawler.max_links_per_page);
        let config_hash = hash_config(&config);

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            config_hash,
            cancel: CancellationToken::new(),
        })
    }

    /// Records `hash` with every run instead of a hash of the parsed config
    ///
    /// The CLI passes the hash of the configuration file itself.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one crawl session from `seeds`
    ///
    /// Each call is an independent session with its own seen-set. The run is
    /// recorded in the database as `completed`, `interrupted` or `failed`, and
    /// the markdown summary is rewritten afterwards.
    pub async fn start<I, S>(&self, seeds: I) -> Result<CrawlSummary, SkimmerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let files = match &self.config.output.artifact_dir {
            Some(dir) => Some(FileSink::create(dir).await?),
            None => None,
        };

        let run_id = self.lock_storage().create_run(&self.config_hash)?;
        tracing::info!("Starting crawl run {}", run_id);

        let sink = self.build_sink(run_id, files);
        let scheduler = Scheduler::new(
            &self.config.crawler,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            sink,
        )?
        .with_cancellation(self.cancel.child_token());

        let result = scheduler.run(seeds).await;

        let (status, summary) = match &result {
            Ok(summary) if summary.was_cancelled => (RunStatus::Interrupted, summary.clone()),
            Ok(summary) => (RunStatus::Completed, summary.clone()),
            Err(SkimmerError::PersistenceAborted { summary, .. }) => {
                (RunStatus::Failed, (**summary).clone())
            }
            Err(_) => (RunStatus::Failed, CrawlSummary::default()),
        };
        self.lock_storage().finish_run(run_id, status, &summary)?;
        tracing::info!("Run {} finished as {}", run_id, status.to_db_string());

        self.write_summary(run_id)?;

        result
    }

    /// Requests a graceful stop of the current session and any later ones
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Token that cancels this coordinator, for use from other tasks
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Database sink for `run_id`, preceded by the file sink when one is configured
    fn build_sink(&self, run_id: i64, files: Option<FileSink>) -> Arc<dyn ArtifactSink> {
        let sqlite = Arc::new(SqliteSink::new(Arc::clone(&self.storage), run_id));

        let Some(files) = files else {
            return sqlite;
        };
        tracing::debug!("Writing artifact files to {}", files.dir().display());

        Arc::new(
            FanoutSink::new()
                .with_sink(Arc::new(files))
                .with_sink(sqlite),
        )
    }

    fn write_summary(&self, run_id: i64) -> Result<(), SkimmerError> {
        let report = generate_report_for_run(&*self.lock_storage(), run_id)?;
        let path = Path::new(&self.config.output.summary_path);
        generate_markdown_summary(&report, path)?;
        tracing::info!("Summary written to {}", path.display());
        Ok(())
    }

    fn lock_storage(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hash recorded for runs whose configuration did not come from a file
fn hash_config(config: &Config) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", config).as_bytes());
    hex::encode(hasher.finalize())
}
