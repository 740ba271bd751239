//! Scheduler driving the fetch -> extract -> persist -> enqueue loop
//!
//! This module handles:
//! - The FIFO frontier of admitted tasks
//! - Global concurrency limiting via a semaphore
//! - Retry timers that wait out backoff delays without holding a permit
//! - Depth limiting of discovered identifiers
//! - Cooperative cancellation with a bounded grace period for in-flight work
//!
//! All crawl state is owned by the loop in [`Scheduler::run`]; spawned work
//! hands its task back through the join set when it finishes.

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::crawler::extractor::{Extraction, Extractor};
use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::retry::{Failure, FailureKind, RetryDecision, RetryPolicy};
use crate::crawler::task::CrawlTask;
use crate::output::CrawlSummary;
use crate::state::{AdmitResult, Deduplicator, TaskState};
use crate::storage::{ArtifactSink, StorageError};
use crate::url::ResourceId;
use crate::{ConfigError, SkimmerError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What a finished unit of work reports back to the loop
enum Outcome {
    Stored {
        task: CrawlTask,
        discovered: Vec<ResourceId>,
    },
    FetchFailed {
        task: CrawlTask,
        failure: Failure,
    },
    StoreFailed {
        task: CrawlTask,
        discovered: Vec<ResourceId>,
        error: StorageError,
    },
}

/// Mutable state of one crawl session
///
/// Created at the start of [`Scheduler::run`] and dropped when it returns.
struct CrawlState {
    seen: Deduplicator,
    frontier: VecDeque<CrawlTask>,
    in_flight: JoinSet<Outcome>,
    waiting: JoinSet<CrawlTask>,
    summary: CrawlSummary,
}

impl CrawlState {
    fn new() -> Self {
        Self {
            seen: Deduplicator::new(),
            frontier: VecDeque::new(),
            in_flight: JoinSet::new(),
            waiting: JoinSet::new(),
            summary: CrawlSummary::new(),
        }
    }

    /// Tasks admitted and waiting for a permit
    fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Tasks currently being fetched, extracted or persisted
    fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Tasks waiting out a retry delay
    fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// True once no work is queued, running, or scheduled
    fn is_idle(&self) -> bool {
        self.frontier.is_empty() && self.in_flight.is_empty() && self.waiting.is_empty()
    }

    fn admit_seed(&mut self, raw: &str) {
        if let AdmitResult::Accepted(id) = self.seen.admit(raw) {
            self.summary.total_discovered += 1;
            self.frontier.push_back(CrawlTask::seed(id));
        } else {
            tracing::debug!("Skipping duplicate seed {}", raw);
        }
    }

    /// Admits discoveries of `parent` unless they would exceed `max_depth`
    fn enqueue_discovered(
        &mut self,
        parent: &CrawlTask,
        discovered: Vec<ResourceId>,
        max_depth: u32,
    ) {
        if parent.depth >= max_depth {
            return;
        }

        for id in discovered {
            if let AdmitResult::Accepted(id) = self.seen.admit_id(id) {
                self.summary.total_discovered += 1;
                self.frontier.push_back(CrawlTask::discovered(id, parent));
            }
        }
    }
}

/// Concurrency-bounded crawl engine
pub struct Scheduler {
    config: CrawlerConfig,
    policy: RetryPolicy,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn ArtifactSink>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// # Returns
    ///
    /// * `Ok(Scheduler)` - Ready to run
    /// * `Err(ConfigError)` - The crawler settings are unusable (for example a
    ///   concurrency limit of zero); no work has been started
    pub fn new(
        config: &CrawlerConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self, ConfigError> {
        validate_crawler_config(config)?;

        Ok(Self {
            config: config.clone(),
            policy: RetryPolicy::from_config(config),
            fetcher,
            extractor,
            sink,
            cancel: CancellationToken::new(),
        })
    }

    /// Uses `token` to stop the crawl instead of a private token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops this scheduler when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests a graceful stop of the running crawl
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Crawls outward from `seeds` until no work remains or the crawl is cancelled
    ///
    /// Per-task failures are counted in the returned summary and never fail
    /// the run. The run itself fails only on an internal error, or on the
    /// first persistence failure when `abort-on-write-error` is set.
    pub async fn run<I, S>(&self, seeds: I) -> Result<CrawlSummary, SkimmerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let started = Instant::now();
        let mut state = CrawlState::new();

        for seed in seeds {
            state.admit_seed(seed.as_ref());
        }

        tracing::info!(
            "Starting crawl: {} seed(s), max concurrency {}, max depth {}",
            state.frontier_len(),
            self.config.max_concurrency,
            self.config.max_depth
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency as usize));
        let mut abort: Option<SkimmerError> = None;
        let mut last_progress = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.dispatch(&mut state, &permits)?;

            if state.is_idle() {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(joined) = state.in_flight.join_next(), if !state.in_flight.is_empty() => {
                    self.complete(&mut state, joined?, true, &mut abort)?;
                }

                Some(joined) = state.waiting.join_next(), if !state.waiting.is_empty() => {
                    let mut task = joined?;
                    task.advance(TaskState::Pending)?;
                    state.frontier.push_back(task);
                }
            }

            if last_progress.elapsed() >= PROGRESS_INTERVAL {
                tracing::info!(
                    "Progress: {} succeeded, {} abandoned, {} queued, {} in flight, {} waiting",
                    state.summary.succeeded,
                    state.summary.abandoned,
                    state.frontier_len(),
                    state.in_flight_count(),
                    state.waiting_count()
                );
                last_progress = Instant::now();
            }
        }

        let was_cancelled = self.cancel.is_cancelled();
        if was_cancelled {
            self.shut_down(&mut state, &mut abort).await?;
        }

        let mut summary = state.summary;
        summary.elapsed = started.elapsed();
        summary.was_cancelled = was_cancelled;

        if let Some(mut error) = abort {
            tracing::error!("Crawl aborted: {}", error);
            if let SkimmerError::PersistenceAborted { summary: partial, .. } = &mut error {
                **partial = summary;
            }
            return Err(error);
        }

        tracing::info!("Crawl finished: {}", summary);
        Ok(summary)
    }

    /// Moves frontier tasks into flight while permits are available
    fn dispatch(
        &self,
        state: &mut CrawlState,
        permits: &Arc<Semaphore>,
    ) -> Result<(), SkimmerError> {
        while !state.frontier.is_empty() {
            let Ok(permit) = Arc::clone(permits).try_acquire_owned() else {
                break;
            };
            let Some(mut task) = state.frontier.pop_front() else {
                break;
            };

            task.begin_attempt()?;
            tracing::debug!(
                "Fetching {} (depth {}, attempt {})",
                task.id,
                task.depth,
                task.attempts
            );

            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let sink = Arc::clone(&self.sink);
            let timeout = self.config.timeout();

            state
                .in_flight
                .spawn(process(task, permit, fetcher, extractor, sink, timeout));
        }
        Ok(())
    }

    /// Applies a finished unit of work to the crawl state
    ///
    /// With `accepting` false the crawl is shutting down: nothing new is
    /// admitted and retries are counted as cancelled instead of scheduled.
    fn complete(
        &self,
        state: &mut CrawlState,
        outcome: Outcome,
        accepting: bool,
        abort: &mut Option<SkimmerError>,
    ) -> Result<(), SkimmerError> {
        match outcome {
            Outcome::Stored {
                mut task,
                discovered,
            } => {
                task.advance(TaskState::Succeeded)?;
                state.summary.succeeded += 1;
                tracing::debug!(
                    "Stored {} with {} discovered link(s)",
                    task.id,
                    discovered.len()
                );
                if accepting {
                    state.enqueue_discovered(&task, discovered, self.config.max_depth);
                }
            }

            Outcome::FetchFailed { mut task, failure } => {
                match self.policy.next_action(task.attempts, &failure) {
                    RetryDecision::Retry(delay) if accepting => {
                        task.advance(TaskState::RetryScheduled)?;
                        state.summary.retries += 1;
                        tracing::debug!(
                            "Retrying {} in {:?} after attempt {}: {}",
                            task.id,
                            delay,
                            task.attempts,
                            failure
                        );
                        state.waiting.spawn(async move {
                            tokio::time::sleep(delay).await;
                            task
                        });
                    }
                    RetryDecision::Retry(_) => {
                        state.summary.cancelled += 1;
                    }
                    RetryDecision::Abandon(kind) => {
                        task.advance(TaskState::Abandoned)?;
                        state.summary.record_abandoned(kind);
                        tracing::warn!(
                            "Abandoned {} after {} attempt(s): {}",
                            task.id,
                            task.attempts,
                            failure
                        );
                    }
                }
            }

            Outcome::StoreFailed {
                mut task,
                discovered,
                error,
            } => {
                task.advance(TaskState::Abandoned)?;
                state.summary.record_abandoned(FailureKind::Persistence);
                tracing::warn!("Failed to persist {}: {}", task.id, error);

                if self.config.abort_on_write_error {
                    if abort.is_none() {
                        *abort = Some(SkimmerError::PersistenceAborted {
                            url: task.id.to_string(),
                            message: error.to_string(),
                            summary: Box::default(),
                        });
                        self.cancel.cancel();
                    }
                } else if accepting {
                    state.enqueue_discovered(&task, discovered, self.config.max_depth);
                }
            }
        }
        Ok(())
    }

    /// Stops a cancelled crawl
    ///
    /// Retry timers and frontier tasks are dropped at once. In-flight work
    /// gets `shutdown-grace` to finish; whatever is left is aborted.
    async fn shut_down(
        &self,
        state: &mut CrawlState,
        abort: &mut Option<SkimmerError>,
    ) -> Result<(), SkimmerError> {
        let waiting = state.waiting.len() as u64;
        state.waiting.shutdown().await;

        let queued = state.frontier.len() as u64;
        state.frontier.clear();

        state.summary.cancelled += waiting + queued;

        tracing::info!(
            "Cancelling crawl: dropped {} queued and {} waiting task(s), draining {} in flight",
            queued,
            waiting,
            state.in_flight.len()
        );

        let grace = self.config.shutdown_grace();
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = state.in_flight.join_next().await {
                self.complete(state, joined?, false, abort)?;
            }
            Ok::<(), SkimmerError>(())
        })
        .await;

        match drained {
            Ok(result) => result?,
            Err(_) => {
                let remaining = state.in_flight.len() as u64;
                tracing::warn!(
                    "Aborting {} task(s) still in flight after {:?}",
                    remaining,
                    grace
                );
                state.in_flight.shutdown().await;
                state.summary.cancelled += remaining;
            }
        }

        Ok(())
    }
}

/// How often the loop logs progress
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// One attempt at one task: fetch, extract, persist
async fn process(
    task: CrawlTask,
    _permit: OwnedSemaphorePermit,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn ArtifactSink>,
    timeout: Duration,
) -> Outcome {
    let content = match fetcher.fetch(&task.id, timeout).await {
        FetchResult::Success(content) => content,
        FetchResult::RetryableFailure(reason) => {
            return Outcome::FetchFailed {
                task,
                failure: Failure::Retryable(reason),
            }
        }
        FetchResult::PermanentFailure(reason) => {
            return Outcome::FetchFailed {
                task,
                failure: Failure::Permanent(reason),
            }
        }
    };

    let Extraction {
        artifact,
        discovered,
    } = extractor.extract(&content, &task.id);
    let artifact = artifact.with_lineage(task.parent.clone(), task.depth);

    match sink.store(artifact).await {
        Ok(()) => Outcome::Stored { task, discovered },
        Err(error) => Outcome::StoreFailed {
            task,
            discovered,
            error,
        },
    }
}
