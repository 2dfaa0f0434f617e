//! JSON report writer.
//!
//! Reports are grouped by the local date of the run, one file per run, named
//! after the local time it was generated.

use crate::models::BriefReport;
use chrono::Local;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path a report is written to: `{output_dir}/{YYYY-MM-DD}/brief_{HHMMSS}.json`.
pub fn report_path(report: &BriefReport, output_dir: &str) -> PathBuf {
    let local = report.generated_at.with_timezone(&Local);
    Path::new(output_dir)
        .join(local.format("%Y-%m-%d").to_string())
        .join(format!("brief_{}.json", local.format("%H%M%S")))
}

/// Write a [`BriefReport`] as pretty-printed JSON, creating the date directory.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_report(report: &BriefReport, output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(report, output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring report directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), items = report.items.len(), "Wrote report");
    Ok(path)
}
