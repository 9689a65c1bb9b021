use crate::error::CliError;
use engine_core::progress::StatusReport;
use engine_runtime::execution::RunSummary;
use serde::Serialize;
use std::{fmt::Write, path::Path};

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", to_json(value)?);
    Ok(())
}

pub async fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), CliError> {
    tokio::fs::write(path, to_json(value)?).await?;
    Ok(())
}

pub fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    let run_id = report.run_id.as_deref().unwrap_or("none");
    let _ = writeln!(out, "Migration run '{run_id}':");
    let _ = writeln!(out, "-----------------------------");
    let _ = writeln!(out, "{:<16} {}", "Stage", report.stage);
    let _ = writeln!(out, "{:<16} {}", "Status", report.overall_status);
    let _ = writeln!(out, "{:<16} {:.1}%", "Progress", report.overall_progress);
    let _ = writeln!(
        out,
        "{:<16} {}/{}",
        "Groups", report.completed_groups, report.total_groups
    );
    let _ = writeln!(
        out,
        "{:<16} {}/{}",
        "Records", report.migrated_records, report.total_records
    );
    let _ = writeln!(out, "{:<16} {}", "Errors", report.error_count);
    let checkpoint = report
        .last_checkpoint
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());
    let _ = writeln!(out, "{:<16} {}", "Last checkpoint", checkpoint);

    if !report.groups.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<16} {:<12} {:>8} {:>16}",
            "Group", "Status", "Progress", "Records"
        );
        for group in &report.groups {
            let records = format!("{}/{}", group.migrated_records, group.total_records);
            let _ = writeln!(
                out,
                "{:<16} {:<12} {:>7.1}% {:>16}",
                group.name,
                group.status.as_str(),
                group.progress_pct,
                records
            );
            if let Some(err) = &group.last_error {
                let _ = writeln!(out, "{:<16} last error: {err}", "");
            }
        }
    }
    out
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {}", "Run", summary.run_id);
    let _ = writeln!(out, "{:<16} {}", "Status", summary.status);
    let _ = writeln!(out, "{:<16} {}", "Groups", summary.groups.join(", "));
    let _ = writeln!(out, "{:<16} {}", "Records", summary.migrated_records);
    let _ = writeln!(out, "{:<16} {}", "Batches", summary.metrics.batches_written);
    let _ = writeln!(out, "{:<16} {}", "Retries", summary.metrics.retry_count);
    let _ = writeln!(out, "{:<16} {}", "Throttled", summary.metrics.throttle_count);
    out
}
