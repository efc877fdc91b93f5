//! Output module for run reports
//!
//! This module handles:
//! - Aggregating per-task outcomes into stage and run reports
//! - Rendering a human-readable summary once a run ends

mod report;
mod stats;

pub use report::{FailedTask, RunReport, Stage, StageReport};
pub use stats::{print_summary, render_summary};
