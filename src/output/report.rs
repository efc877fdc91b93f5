//! Run and stage report types
//!
//! Reports aggregate per-task outcomes so a run can finish with a
//! complete list of what failed instead of stopping at the first failure.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// The two crawl stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Paginated listing pages
    Listing,
    /// Per-item detail pages
    Detail,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listing => write!(f, "listing"),
            Self::Detail => write!(f, "detail"),
        }
    }
}

/// A task whose retries were exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTask {
    pub task: String,
    pub url: String,
    pub attempts: u32,
    pub cause: String,
}

/// Outcome of one stage for one target
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    /// Location name (listing stage) or checkpoint file (detail stage)
    pub target: String,
    pub tasks_total: usize,
    pub succeeded: usize,
    /// Records staged for persistence
    pub records_accepted: usize,
    /// Records dropped as duplicates
    pub duplicates: usize,
    /// Records the sink confirmed
    pub records_flushed: usize,
    pub failed: Vec<FailedTask>,
}

impl StageReport {
    pub fn new(stage: Stage, target: impl Into<String>, tasks_total: usize) -> Self {
        Self {
            stage,
            target: target.into(),
            tasks_total,
            succeeded: 0,
            records_accepted: 0,
            duplicates: 0,
            records_flushed: 0,
            failed: Vec::new(),
        }
    }

    pub fn record_success(&mut self, accepted: usize, duplicates: usize) {
        self.succeeded += 1;
        self.records_accepted += accepted;
        self.duplicates += duplicates;
    }

    pub fn record_failure(&mut self, failure: FailedTask) {
        self.failed.push(failure);
    }

    /// True when every task succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.succeeded == self.tasks_total
    }
}

/// Everything a run did, stage by stage
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
    /// Listing files produced (or reused) by the run, in location order
    pub aggregate_files: Vec<PathBuf>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            aggregate_files: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn stages_of(&self, stage: Stage) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(move |s| s.stage == stage)
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = (&StageReport, &FailedTask)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.failed.iter().map(move |f| (stage, f)))
    }

    pub fn total_failed(&self) -> usize {
        self.stages.iter().map(|s| s.failed.len()).sum()
    }

    pub fn total_records(&self) -> usize {
        self.stages.iter().map(|s| s.records_flushed).sum()
    }
}
