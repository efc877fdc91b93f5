//! Crawler module for fetching and processing listing and detail pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching through an optional proxy API
//! - Bounded retry with exponential backoff
//! - JSON-LD and HTML record extraction
//! - Two-stage crawl coordination with bounded concurrency

mod coordinator;
mod fetcher;
mod parser;
mod retry;
mod task;

pub use coordinator::{Coordinator, RunMode, TaskError};
pub use fetcher::{
    build_http_client, proxied_url, FetchError, Fetcher, HttpFetcher, Payload, RoutingHints,
};
pub use parser::{extract_detail, extract_listings, ExtractionError};
pub use retry::{with_retry, Backoff, ExhaustedRetries};
pub use task::{CrawlTask, DetailTask, ListingTask};

use crate::config::Config;
use crate::output::RunReport;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client (and proxy routing, if configured)
/// 2. Crawl every location's listing pages into its listing file
/// 3. Crawl the detail page of every listed item, unless `mode` says otherwise
///
/// # Arguments
///
/// * `config` - The validated harvester configuration
/// * `mode` - Which stages to run
///
/// # Returns
///
/// * `Ok(RunReport)` - Every stage ran to completion; individual tasks may still have failed
/// * `Err(CrawlError)` - A stage aborted or the run could not start
pub async fn crawl(config: Config, mode: RunMode) -> Result<RunReport, CrawlError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run(mode).await
}
