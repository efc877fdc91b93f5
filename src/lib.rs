//! Listing-Harvest: a concurrent listing and detail page harvester
//!
//! This crate fetches paginated listing pages and per-item detail pages,
//! extracts structured records from embedded JSON-LD and HTML fragments,
//! deduplicates them, and appends them incrementally to CSV files.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod url;

use thiserror::Error;

/// Main error type for Listing-Harvest operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("Sink error: {0}")]
    Sink(#[from] pipeline::SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Checkpoint error for {path}: {message}")]
    Checkpoint { path: String, message: String },

    #[error(
        "{stage} stage for '{target}' aborted with {} incomplete task(s): {reason}",
        incomplete.len()
    )]
    StageAborted {
        stage: output::Stage,
        target: String,
        incomplete: Vec<String>,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Listing-Harvest operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{CsvSink, DedupBuffer, RecordSink};
pub use record::{DetailRecord, Record, SearchRecord};
