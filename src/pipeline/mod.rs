//! Pipeline module for staging and persisting records
//!
//! This module handles:
//! - In-memory deduplication by identity key
//! - Batching accepted records and flushing them to durable storage
//! - CSV sinks and reading listing files back as detail-stage checkpoints

mod buffer;
mod csv_sink;
mod traits;

pub use buffer::{Acceptance, BufferStats, DedupBuffer};
pub use csv_sink::{read_identity_keys, read_listing_rows, CsvSink, ListingRow};
pub use traits::{PipelineError, RecordSink, SinkError, SinkResult};
