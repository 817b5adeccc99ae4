//! Run report files under `reports/<run_id>/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

use crate::orchestrator::RunReport;

pub const REPORT_JSON: &str = "run_report.json";
pub const SUMMARY_MD: &str = "summary.md";

/// Writes `run_report.json` and `summary.md`; returns the run directory.
pub async fn write_reports(reports_root: &Path, report: &RunReport) -> Result<PathBuf> {
    let dir = reports_root.join(report.run_id.to_string());
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let json = serde_json::to_vec_pretty(report).context("serializing run report")?;
    fs::write(dir.join(REPORT_JSON), json)
        .await
        .with_context(|| format!("writing {REPORT_JSON}"))?;

    fs::write(dir.join(SUMMARY_MD), summary_markdown(report))
        .await
        .with_context(|| format!("writing {SUMMARY_MD}"))?;

    Ok(dir)
}

pub fn summary_markdown(report: &RunReport) -> String {
    let mut lines = vec![
        "# Scrape Run Summary".to_string(),
        String::new(),
        format!("- Run ID: `{}`", report.run_id),
        format!("- Started: {}", report.started_at),
        format!("- Finished: {}", report.finished_at),
        format!("- Sources: {}", report.results.len()),
        format!("- Failures: {}", report.failures),
        String::new(),
        "## Sources".to_string(),
        String::new(),
        "| Source | Found | Created | Updated | Unchanged | Failed | Error |".to_string(),
        "|---|---:|---:|---:|---:|---:|---|".to_string(),
    ];
    for r in &report.results {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            r.name,
            r.found,
            r.created,
            r.updated,
            r.unchanged,
            r.failed,
            r.error.as_deref().unwrap_or("")
        ));
    }
    let t = &report.totals;
    lines.push(format!(
        "| **Total** | {} | {} | {} | {} | {} | |",
        t.found, t.created, t.updated, t.unchanged, t.failed
    ));
    lines.push(String::new());
    lines.join("\n")
}
