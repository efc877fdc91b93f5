//! CSV-backed sink and checkpoint reader
//!
//! Listing files double as the checkpoint between the listing and detail
//! stages, so this module also reads them back.

use crate::config::IdentityKey;
use crate::pipeline::traits::{RecordSink, SinkError, SinkResult};
use crate::record::Record;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Append-only CSV file sink
///
/// The header row is written only when the file is missing or empty, so
/// restarted runs keep appending under the original header.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn needs_header(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        }
    }
}

impl<R: Record> RecordSink<R> for CsvSink {
    fn append(&mut self, records: &[R]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let write_header = self.needs_header();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if write_header {
            writer.write_record(R::COLUMNS)?;
        }

        for record in records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

/// A listing row as the detail stage needs it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListingRow {
    pub name: String,
    pub url: String,
}

/// Reads a listing CSV back as detail-stage input
///
/// Extra columns are ignored; `name` and `url` are required.
pub fn read_listing_rows(path: &Path) -> SinkResult<Vec<ListingRow>> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    require_columns(path, reader.headers()?, &["name", "url"])?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Collects identity keys already present in a listing CSV
///
/// A missing file yields no keys.
pub fn read_identity_keys(path: &Path, key: IdentityKey) -> SinkResult<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    Ok(read_listing_rows(path)?
        .into_iter()
        .map(|row| match key {
            IdentityKey::Url => row.url,
            IdentityKey::Name => row.name,
        })
        .collect())
}

fn require_columns(path: &Path, headers: &csv::StringRecord, columns: &[&str]) -> SinkResult<()> {
    for column in columns {
        if !headers.iter().any(|h| h == *column) {
            return Err(SinkError::MissingColumn {
                path: path.display().to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}
