//! Crawler coordinator - two-stage crawl orchestration
//!
//! This module drives both crawl stages:
//! - Listing stage: fan out one task per listing page, at most
//!   `max-workers` in flight, feeding every extracted record into one
//!   dedup buffer per location
//! - Detail stage: read the closed listing file back and fan out one
//!   task per listed item, each persisted to its own file
//!
//! A task whose retries are exhausted is recorded as failed and its
//! siblings carry on. A sink failure is fatal and aborts the stage.

use crate::config::{Config, IdentityKey, LocationEntry};
use crate::crawler::fetcher::{FetchError, Fetcher, HttpFetcher, RoutingHints};
use crate::crawler::parser::{extract_detail, extract_listings, ExtractionError};
use crate::crawler::retry::{with_retry, Backoff, ExhaustedRetries};
use crate::crawler::task::{CrawlTask, DetailTask, ListingTask};
use crate::output::{FailedTask, RunReport, Stage, StageReport};
use crate::pipeline::{
    read_identity_keys, read_listing_rows, Acceptance, CsvSink, DedupBuffer, PipelineError,
};
use crate::record::{DetailRecord, Record, SearchRecord};
use crate::url::{detail_file_name, file_name_for};
use crate::CrawlError;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failure of one fetch-and-extract attempt
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Which stages a run executes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Listing stage, then the detail stage if enabled in config
    #[default]
    Full,
    /// Listing stage only
    ListingsOnly,
    /// Detail stage only, from listing files left by an earlier run
    DetailsOnly,
}

/// How a single task ended, short of a fatal error
enum TaskOutcome {
    Completed {
        accepted: usize,
        duplicates: usize,
        flushed: usize,
    },
    Failed(FailedTask),
}

/// Main crawler coordinator structure
pub struct Coordinator<F: Fetcher> {
    config: Config,
    fetcher: F,
    routing: RoutingHints,
    base_url: Url,
    backoff: Backoff,
}

impl Coordinator<HttpFetcher> {
    /// Creates a coordinator that fetches over HTTP
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let fetcher = HttpFetcher::from_config(&config)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: Fetcher> Coordinator<F> {
    /// Creates a coordinator around any [`Fetcher`]
    pub fn with_fetcher(config: Config, fetcher: F) -> Result<Self, CrawlError> {
        let base_url = Url::parse(&config.site.base_url)?;
        let routing = RoutingHints::new(config.routing.country.clone());

        let backoff = if config.crawler.retry_backoff_ms == 0 {
            Backoff::none()
        } else {
            Backoff::exponential(
                Duration::from_millis(config.crawler.retry_backoff_ms),
                Duration::from_millis(config.crawler.retry_backoff_max_ms),
            )
        };

        Ok(Self {
            config,
            fetcher,
            routing,
            base_url,
            backoff,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// CSV file that holds a location's listings
    pub fn listing_destination(&self, location: &LocationEntry) -> PathBuf {
        Path::new(&self.config.output.directory).join(file_name_for(&location.locality))
    }

    /// CSV file that holds one item's details
    ///
    /// Keyed by name and URL so listings sharing a name never share a file.
    pub fn detail_destination(&self, name: &str, url: &str) -> PathBuf {
        Path::new(&self.config.output.directory).join(detail_file_name(name, url))
    }

    /// Runs every configured location through the selected stages
    ///
    /// Locations are processed one after another. A location's detail
    /// stage starts only once its listing buffer is closed, and reads the
    /// listing file back rather than any in-memory state.
    pub async fn run(&self, mode: RunMode) -> Result<RunReport, CrawlError> {
        tracing::info!("Crawl starting...");
        let mut report = RunReport::start();

        let run_details = match mode {
            RunMode::Full => self.config.crawler.detail_stage,
            RunMode::ListingsOnly => false,
            RunMode::DetailsOnly => true,
        };

        for location in &self.config.locations {
            let listing_file = self.listing_destination(location);

            if mode != RunMode::DetailsOnly {
                let stage = self.run_listing_stage(location).await?;
                report.stages.push(stage);
            }
            report.aggregate_files.push(listing_file.clone());

            if !run_details {
                continue;
            }
            if !listing_file.exists() {
                tracing::warn!(
                    "No listing file at {}, skipping its detail stage",
                    listing_file.display()
                );
                continue;
            }
            let stage = self.run_detail_stage(&listing_file).await?;
            report.stages.push(stage);
        }

        report.finish();
        tracing::info!(
            "Crawl complete: {} record(s) written, {} failed task(s)",
            report.total_records(),
            report.total_failed()
        );

        Ok(report)
    }

    /// Crawls `pages` listing pages of one location into its listing file
    ///
    /// The buffer is closed before this returns, on success and on abort.
    pub async fn run_listing_stage(
        &self,
        location: &LocationEntry,
    ) -> Result<StageReport, CrawlError> {
        let destination = self.listing_destination(location);
        let identity = self.config.crawler.dedup_key;
        let buffer = self.buffer::<SearchRecord>(&destination, identity);

        if self.config.crawler.preload_seen {
            let keys = read_identity_keys(&destination, identity)?;
            let added = buffer.preload(keys);
            tracing::info!(
                "Preloaded {} known listing(s) from {}",
                added,
                destination.display()
            );
        }

        let tasks = ListingTask::plan(&self.base_url, location, self.config.crawler.pages)?;
        tracing::info!(
            "Listing stage for {}: {} page(s), {} worker(s) -> {}",
            location.locality,
            tasks.len(),
            self.max_workers(),
            destination.display()
        );

        let result = self
            .run_tasks(Stage::Listing, &location.locality, tasks, |task| {
                self.listing_task(task, &buffer)
            })
            .await;

        let closed = buffer.close();
        match (result, closed) {
            (Ok(mut report), Ok(stats)) => {
                report.records_flushed = stats.flushed_records;
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    tracing::error!(
                        "Closing {} after abort also failed: {}",
                        destination.display(),
                        close_error
                    );
                }
                Err(e)
            }
        }
    }

    /// Fetches the detail page of every item in a listing file
    ///
    /// Rows are deduplicated by item URL first, so an item is fetched and
    /// written at most once per run even if the listing file repeats it.
    /// Each item is written to its own file through its own buffer.
    pub async fn run_detail_stage(&self, checkpoint: &Path) -> Result<StageReport, CrawlError> {
        tracing::info!("processing {}", checkpoint.display());

        let rows = read_listing_rows(checkpoint).map_err(|e| CrawlError::Checkpoint {
            path: checkpoint.display().to_string(),
            message: e.to_string(),
        })?;

        let (tasks, duplicates) = DetailTask::plan(rows);
        if duplicates > 0 {
            tracing::info!(
                "Dropped {} repeated row(s) from {}",
                duplicates,
                checkpoint.display()
            );
        }

        let target = checkpoint.display().to_string();
        let mut report = self
            .run_tasks(Stage::Detail, &target, tasks, |task| self.detail_task(task))
            .await?;
        report.duplicates += duplicates;
        Ok(report)
    }

    /// One listing page: fetch and extract with retries, then stage the records
    async fn listing_task(
        &self,
        task: ListingTask,
        buffer: &DedupBuffer<SearchRecord, CsvSink>,
    ) -> Result<TaskOutcome, CrawlError> {
        let fetched = with_retry(task.url(), self.max_retries(), &self.backoff, |_| {
            self.fetch_listing(&task)
        })
        .await;

        let records = match fetched {
            Ok(records) => records,
            Err(exhausted) => return Ok(TaskOutcome::Failed(failed_task(&task, exhausted))),
        };

        let (accepted, duplicates) = accept_all(buffer, records)?;
        tracing::info!("Successfully parsed data from: {}", task.url());
        Ok(TaskOutcome::Completed {
            accepted,
            duplicates,
            flushed: 0,
        })
    }

    /// One detail page, persisted through a buffer of its own
    async fn detail_task(&self, task: DetailTask) -> Result<TaskOutcome, CrawlError> {
        let fetched = with_retry(task.url(), self.max_retries(), &self.backoff, |_| {
            self.fetch_detail(&task)
        })
        .await;

        let record = match fetched {
            Ok(record) => record,
            Err(exhausted) => return Ok(TaskOutcome::Failed(failed_task(&task, exhausted))),
        };

        let destination = self.detail_destination(&task.name, task.url());
        let buffer = self.buffer::<DetailRecord>(&destination, IdentityKey::Name);
        buffer.accept(record)?;
        let stats = buffer.close()?;

        tracing::info!("Successfully parsed: {}", task.url());
        Ok(TaskOutcome::Completed {
            accepted: stats.accepted,
            duplicates: stats.duplicates,
            flushed: stats.flushed_records,
        })
    }

    /// Runs tasks with bounded concurrency and aggregates their outcomes
    ///
    /// Completion order, not submission order, drives the loop. A fatal
    /// error drops the stream, cancelling whatever is still in flight.
    async fn run_tasks<T, W, Fut>(
        &self,
        stage: Stage,
        target: &str,
        tasks: Vec<T>,
        work: W,
    ) -> Result<StageReport, CrawlError>
    where
        T: CrawlTask,
        W: Fn(T) -> Fut,
        Fut: Future<Output = Result<TaskOutcome, CrawlError>>,
    {
        let mut report = StageReport::new(stage, target, tasks.len());
        let mut pending: BTreeMap<usize, String> = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (index, task.describe()))
            .collect();

        let mut outcomes = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| {
                let outcome = work(task);
                async move { (index, outcome.await) }
            })
            .buffer_unordered(self.max_workers());

        while let Some((index, outcome)) = outcomes.next().await {
            let description = pending.remove(&index).unwrap_or_default();

            match outcome {
                Ok(TaskOutcome::Completed {
                    accepted,
                    duplicates,
                    flushed,
                }) => {
                    report.record_success(accepted, duplicates);
                    report.records_flushed += flushed;
                }
                Ok(TaskOutcome::Failed(failure)) => {
                    tracing::error!(
                        "{} failed permanently after {} attempt(s): {}",
                        failure.task,
                        failure.attempts,
                        failure.cause
                    );
                    report.record_failure(failure);
                }
                Err(e) => {
                    let mut incomplete = vec![description];
                    incomplete.extend(pending.into_values());
                    tracing::error!(
                        "Aborting {} stage for {}: {} ({} task(s) incomplete)",
                        stage,
                        target,
                        e,
                        incomplete.len()
                    );
                    return Err(CrawlError::StageAborted {
                        stage,
                        target: target.to_string(),
                        incomplete,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "{} stage for {} finished: {} succeeded, {} failed",
            stage,
            target,
            report.succeeded,
            report.failed.len()
        );
        Ok(report)
    }

    async fn fetch_listing(&self, task: &ListingTask) -> Result<Vec<SearchRecord>, TaskError> {
        let payload = self.fetcher.fetch(task.url(), &self.routing).await?;
        let records = extract_listings(&payload.body, &task.page_url)?;
        tracing::debug!("Extracted {} listing(s) from {}", records.len(), task.url());
        Ok(records)
    }

    async fn fetch_detail(&self, task: &DetailTask) -> Result<DetailRecord, TaskError> {
        let payload = self.fetcher.fetch(task.url(), &self.routing).await?;
        Ok(extract_detail(&payload.body, &task.name)?)
    }

    fn buffer<R: Record>(&self, destination: &Path, identity: IdentityKey) -> DedupBuffer<R, CsvSink> {
        DedupBuffer::new(
            CsvSink::new(destination),
            self.config.crawler.batch_limit,
            identity,
        )
        .with_close_timeout(Duration::from_millis(self.config.crawler.close_timeout_ms))
    }

    fn max_workers(&self) -> usize {
        self.config.crawler.max_workers.max(1) as usize
    }

    fn max_retries(&self) -> u32 {
        self.config.crawler.max_retries
    }
}

/// Offers every record to the buffer, counting staged and dropped ones
fn accept_all<R: Record>(
    buffer: &DedupBuffer<R, CsvSink>,
    records: Vec<R>,
) -> Result<(usize, usize), PipelineError> {
    let mut accepted = 0;
    let mut duplicates = 0;
    for record in records {
        match buffer.accept(record)? {
            Acceptance::Staged => accepted += 1,
            Acceptance::Duplicate => duplicates += 1,
        }
    }
    Ok((accepted, duplicates))
}

fn failed_task<T: CrawlTask>(task: &T, exhausted: ExhaustedRetries<TaskError>) -> FailedTask {
    FailedTask {
        task: task.describe(),
        url: task.url().to_string(),
        attempts: exhausted.attempts,
        cause: exhausted.last_error.to_string(),
    }
}
