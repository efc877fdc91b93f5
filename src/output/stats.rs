//! Human-readable run summaries

use crate::output::report::{RunReport, Stage};
use std::fmt::Write;

/// Renders a run report as plain text
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "=== Harvest Summary ===\n");
    let _ = writeln!(out, "Started:  {}", report.started_at.to_rfc3339());
    if let Some(finished) = report.finished_at {
        let _ = writeln!(out, "Finished: {}", finished.to_rfc3339());
    }
    if let Some(seconds) = report.duration_seconds() {
        let _ = writeln!(out, "Duration: {}s", seconds);
    }
    let _ = writeln!(out);

    for stage in [Stage::Listing, Stage::Detail] {
        let reports: Vec<_> = report.stages_of(stage).collect();
        if reports.is_empty() {
            continue;
        }

        let tasks: usize = reports.iter().map(|r| r.tasks_total).sum();
        let succeeded: usize = reports.iter().map(|r| r.succeeded).sum();
        let flushed: usize = reports.iter().map(|r| r.records_flushed).sum();
        let duplicates: usize = reports.iter().map(|r| r.duplicates).sum();

        let _ = writeln!(out, "{} stage:", capitalize(&stage.to_string()));
        let _ = writeln!(out, "  Tasks: {} / {} succeeded", succeeded, tasks);
        let _ = writeln!(out, "  Records written: {}", flushed);
        let _ = writeln!(out, "  Duplicates dropped: {}", duplicates);
        for r in reports.iter().filter(|r| r.stage == Stage::Listing) {
            let _ = writeln!(out, "  - {}: {} record(s)", r.target, r.records_flushed);
        }
        let _ = writeln!(out);
    }

    if !report.aggregate_files.is_empty() {
        let _ = writeln!(out, "Listing files:");
        for file in &report.aggregate_files {
            let _ = writeln!(out, "  {}", file.display());
        }
        let _ = writeln!(out);
    }

    let failed = report.total_failed();
    if failed > 0 {
        let _ = writeln!(out, "Failed tasks ({}):", failed);
        for (stage, task) in report.failed_tasks() {
            let _ = writeln!(
                out,
                "  [{}] {} ({}) after {} attempt(s): {}",
                stage.stage, task.task, task.url, task.attempts, task.cause
            );
        }
    } else {
        let _ = writeln!(out, "All tasks succeeded");
    }

    out
}

/// Prints a run report to stdout
pub fn print_summary(report: &RunReport) {
    print!("{}", render_summary(report));
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
