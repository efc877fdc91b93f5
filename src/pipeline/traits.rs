//! Sink traits and error types
//!
//! This module defines the trait interface for durable record sinks and
//! the errors the pipeline surfaces to the crawler.

use crate::record::Record;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a durable sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: String, column: String },
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors raised by the dedup buffer
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to flush {records} record(s) to {destination}: {source}")]
    Flush {
        destination: String,
        records: usize,
        source: SinkError,
    },

    #[error("Flush to {destination} still in flight after {waited:?}")]
    FlushTimeout {
        destination: String,
        waited: Duration,
    },

    #[error("Buffer for {destination} is closed")]
    Closed { destination: String },
}

/// Durable, append-only destination for one record type
///
/// Implementations must write records in the order given and must keep
/// the column layout declared by [`Record::COLUMNS`] across calls.
pub trait RecordSink<R: Record>: Send {
    /// Appends a batch of records
    ///
    /// An empty batch must be a no-op.
    fn append(&mut self, records: &[R]) -> SinkResult<()>;

    /// Human-readable destination for logs and errors
    fn destination(&self) -> String;
}
