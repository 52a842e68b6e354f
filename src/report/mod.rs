//! Markdown reports and the fatal-error log.
//!
//! Renderers are pure functions of already-computed data; only [`write_report`]
//! and [`write_error_log`] touch the filesystem.

pub mod alerts;
pub mod degradation;
pub mod healing;
pub mod trend;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::analysis::TrendLabel;

/// Write `body` to `<dir>/<name>`, creating `dir` if needed.
pub fn write_report(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, body)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(path)
}

#[derive(Debug, Serialize)]
struct ErrorLog<'a> {
    timestamp: DateTime<Utc>,
    command: &'a str,
    error: String,
    chain: Vec<String>,
}

/// Record a fatal error as `error-<date>.json` in `dir`.
pub fn write_error_log(
    dir: &Path,
    command: &str,
    err: &anyhow::Error,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let log = ErrorLog {
        timestamp: now,
        command,
        error: err.to_string(),
        chain: err.chain().skip(1).map(ToString::to_string).collect(),
    };
    let body = serde_json::to_string_pretty(&log).context("failed to serialize error log")?;
    write_report(dir, &format!("error-{}.json", now.format("%Y-%m-%d")), &body)
}

/// Status marker for a success rate: at target, above the floor, or below it.
fn rate_marker(rate: f64, target: f64, floor: f64) -> &'static str {
    if rate >= target {
        "✅"
    } else if rate >= floor {
        "⚠️"
    } else {
        "❌"
    }
}

fn trend_marker(trend: TrendLabel) -> &'static str {
    match trend {
        TrendLabel::Improving => "📈",
        TrendLabel::Degrading => "📉",
        TrendLabel::Stable => "➡️",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_log_keeps_cause_chain() {
        let dir = tempfile::tempdir().unwrap();
        let err = anyhow::anyhow!("metrics unavailable").context("trend analysis failed");
        let now = Utc.with_ymd_and_hms(2026, 2, 11, 12, 0, 0).unwrap();

        let path = write_error_log(dir.path(), "trends", &err, now).unwrap();
        assert!(path.ends_with("error-2026-02-11.json"));

        let log: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(log["command"], "trends");
        assert_eq!(log["error"], "trend analysis failed");
        assert_eq!(log["chain"][0], "metrics unavailable");
    }

    #[test]
    fn test_rate_marker_bands() {
        assert_eq!(rate_marker(81.1, 81.1, 75.0), "✅");
        assert_eq!(rate_marker(75.0, 81.1, 75.0), "⚠️");
        assert_eq!(rate_marker(74.99, 81.1, 75.0), "❌");
    }
}
