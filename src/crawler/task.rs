//! Units of crawl work
//!
//! A task is immutable and consumed exactly once by a worker.

use crate::config::LocationEntry;
use crate::pipeline::ListingRow;
use crate::url::{canonicalize_url, listing_page_url};
use crate::UrlError;
use std::collections::HashSet;
use url::Url;

/// What a worker needs to know about the task it runs
pub trait CrawlTask: Send {
    /// The page to fetch
    fn url(&self) -> &str;

    /// Short description for logs and reports
    fn describe(&self) -> String;
}

/// One listing page of one location
#[derive(Debug, Clone)]
pub struct ListingTask {
    pub location: LocationEntry,
    /// Zero-based page index
    pub page_index: u32,
    pub page_url: Url,
}

impl ListingTask {
    pub fn new(base: &Url, location: &LocationEntry, page_index: u32) -> Result<Self, UrlError> {
        Ok(Self {
            location: location.clone(),
            page_index,
            page_url: listing_page_url(base, location, page_index)?,
        })
    }

    /// Tasks for pages `0..pages` of a location
    pub fn plan(base: &Url, location: &LocationEntry, pages: u32) -> Result<Vec<Self>, UrlError> {
        (0..pages)
            .map(|page_index| Self::new(base, location, page_index))
            .collect()
    }
}

impl CrawlTask for ListingTask {
    fn url(&self) -> &str {
        self.page_url.as_str()
    }

    fn describe(&self) -> String {
        format!("{} page {}", self.location.locality, self.page_index + 1)
    }
}

/// One detail page, joined back to its listing by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTask {
    pub url: String,
    pub name: String,
}

impl DetailTask {
    /// One task per distinct item URL, in listing-file order
    ///
    /// Returns the tasks and the number of repeated rows dropped. URLs are
    /// compared in canonical form; a row whose URL does not parse is kept
    /// as written and will fail at fetch time.
    pub fn plan(rows: Vec<ListingRow>) -> (Vec<Self>, usize) {
        let mut seen = HashSet::new();
        let mut tasks = Vec::new();
        let mut duplicates = 0;

        for row in rows {
            let url = canonical_or_raw(&row.url);
            if !seen.insert(url.clone()) {
                duplicates += 1;
                tracing::warn!("Duplicate detail found: {}. Item dropped.", url);
                continue;
            }
            tasks.push(Self {
                url,
                name: row.name,
            });
        }

        (tasks, duplicates)
    }
}

fn canonical_or_raw(raw: &str) -> String {
    let raw = raw.trim();
    Url::parse(raw)
        .ok()
        .and_then(|base| canonicalize_url(raw, &base).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| raw.to_string())
}

impl CrawlTask for DetailTask {
    fn url(&self) -> &str {
        &self.url
    }

    fn describe(&self) -> String {
        format!("detail '{}'", self.name)
    }
}
