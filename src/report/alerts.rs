//! `alert-report-<date>.md`: the last 24 hours of dispatched alerts.

use std::fmt::{self, Write};

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::detect::{Alert, AlertKind, Severity};
use crate::storage::AlertHistory;

const REPORT_WINDOW_HOURS: i64 = 24;

pub fn render(history: &AlertHistory, cfg: &Config, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = write(&mut out, history, cfg, now);
    out
}

fn write(out: &mut String, history: &AlertHistory, cfg: &Config, now: DateTime<Utc>) -> fmt::Result {
    let recent: Vec<&Alert> = history
        .since(now - Duration::hours(REPORT_WINDOW_HOURS))
        .collect();
    let count = |pred: &dyn Fn(&Alert) -> bool| recent.iter().filter(|a| pred(a)).count();

    writeln!(out, "# Healing Alert Report - {}\n", now.format("%Y-%m-%d"))?;
    writeln!(out, "## Alert Summary (Last {REPORT_WINDOW_HOURS} Hours)\n")?;
    writeln!(out, "- **Total Alerts**: {}", recent.len())?;
    writeln!(
        out,
        "- **Critical Alerts**: {}",
        count(&|a| a.severity == Severity::Critical)
    )?;
    writeln!(
        out,
        "- **Warning Alerts**: {}",
        count(&|a| a.severity == Severity::Warning)
    )?;
    writeln!(
        out,
        "- **Recovery Alerts**: {}\n",
        count(&|a| a.kind == AlertKind::Recovery)
    )?;

    writeln!(out, "## Recent Alerts\n")?;
    if recent.is_empty() {
        writeln!(out, "No alerts in the last {REPORT_WINDOW_HOURS} hours.\n")?;
    }
    for alert in &recent {
        writeln!(out, "### {}", alert.title)?;
        writeln!(out, "- **Type**: {}", alert.kind)?;
        writeln!(out, "- **Severity**: {}", alert.severity)?;
        writeln!(out, "- **Time**: {}", alert.timestamp.to_rfc3339())?;
        writeln!(out, "- **Message**: {}", alert.message)?;
        writeln!(
            out,
            "- **Channels**: {}",
            if alert.channels.is_empty() {
                "none".to_string()
            } else {
                alert.channels.join(", ")
            }
        )?;
        if !alert.details.is_null() {
            writeln!(out, "\n**Details**:\n```json")?;
            writeln!(
                out,
                "{}",
                serde_json::to_string_pretty(&alert.details).unwrap_or_default()
            )?;
            writeln!(out, "```")?;
        }
        writeln!(out)?;
    }

    let th = &cfg.thresholds;
    writeln!(out, "## Alert Configuration\n")?;
    writeln!(out, "- **Critical Threshold**: {}%", th.critical)?;
    writeln!(out, "- **Warning Threshold**: {}%", th.warning)?;
    writeln!(
        out,
        "- **Degradation Threshold**: {} percentage points",
        th.degradation
    )?;
    writeln!(out, "- **Consecutive Failures**: {} runs", th.consecutive_failures)?;
    writeln!(
        out,
        "- **Cooldown Period**: {} minutes",
        cfg.settings.cooldown_minutes
    )?;
    writeln!(out, "\n---\n*Generated at {}*", now.to_rfc3339())
}
