//! `degradation-alert-<date>.md`, with an action plan per alert type.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use super::{rate_marker, trend_marker};
use crate::config::Thresholds;
use crate::detect::degradation::{DegradationReport, ReportStatus};
use crate::detect::{Alert, AlertKind, Severity};

fn action_plan(alert: &Alert) -> Vec<String> {
    let plan: &[&str] = match alert.kind {
        AlertKind::Critical | AlertKind::Warning => &[
            "**Investigate failing tests**: run a detailed failure analysis",
            "**Review recent changes**: check for code or infrastructure changes",
            "**Apply emergency healing**: fix known patterns first",
            "**Consider test suspension**: disable unstable tests that block CI",
        ],
        AlertKind::Trend | AlertKind::Degradation => &[
            "**Trend analysis**: review historical data for a pattern",
            "**Root cause analysis**: find what is driving the decline",
            "**Healing pattern review**: update healing rules for new failure modes",
            "**Monitoring enhancement**: increase monitoring frequency",
        ],
        AlertKind::ConsecutiveFailures => {
            let runs = alert
                .details
                .get("consecutiveFailures")
                .and_then(|v| v.as_u64())
                .map_or_else(|| "N".to_string(), |n| n.to_string());
            return vec![
                format!("**Immediate investigation**: analyse the last {runs} failed runs"),
                "**Pattern identification**: look for recurring failure signatures".to_string(),
                "**Quick healing**: apply known healing patterns to common failures".to_string(),
                "**Escalation**: alert the development team if the cause is in code".to_string(),
            ];
        }
        AlertKind::Volatility => &[
            "**Environment check**: investigate test environment stability",
            "**Infrastructure review**: look for resource limits or intermittent outages",
            "**Flaky test analysis**: address non-deterministic tests",
            "**Retry mechanism**: consider retries for unstable tests",
        ],
        AlertKind::SharpDrop => &[
            "**Emergency investigation**: find what triggered the drop",
            "**Change correlation**: map the drop to recent deployments",
            "**Rollback consideration**: decide whether to roll back",
            "**Stakeholder notification**: tell affected teams",
        ],
        AlertKind::Recovery => &["**Monitor closely**: confirm the recovery holds"],
    };
    plan.iter().map(|s| s.to_string()).collect()
}

fn focus_area(kind: AlertKind) -> Option<&'static str> {
    match kind {
        AlertKind::Critical | AlertKind::Warning | AlertKind::ConsecutiveFailures => {
            Some("test failure patterns")
        }
        AlertKind::Trend | AlertKind::Degradation => Some("long-term trend analysis"),
        AlertKind::Volatility => Some("result consistency"),
        AlertKind::SharpDrop => Some("change correlation"),
        AlertKind::Recovery => None,
    }
}

pub fn render(report: &DegradationReport, th: &Thresholds) -> String {
    let mut out = String::new();
    let _ = write(&mut out, report, th);
    out
}

fn write(out: &mut String, r: &DegradationReport, th: &Thresholds) -> fmt::Result {
    let marker = match (r.status, r.critical_alerts) {
        (ReportStatus::Healthy, _) => "✅",
        (_, 0) => "⚠️",
        _ => "🚨",
    };

    writeln!(out, "# Healing Degradation Alert Report {marker}\n")?;
    writeln!(out, "*Generated: {}*\n", r.timestamp.to_rfc3339())?;

    writeln!(out, "## Alert Summary\n")?;
    writeln!(
        out,
        "**Status**: {} {marker}",
        r.status.as_str().to_uppercase()
    )?;
    writeln!(out, "- **Total Alerts**: {}", r.alert_count)?;
    writeln!(out, "- **Critical**: {}", r.critical_alerts)?;
    writeln!(out, "- **Warning**: {}\n", r.warning_alerts)?;

    let m = &r.metrics;
    writeln!(out, "## Current Metrics\n")?;
    writeln!(out, "| Metric | Value | Status |")?;
    writeln!(out, "|--------|-------|--------|")?;
    if let (Some(current), Some(avg), Some(trend)) = (m.current_rate, m.avg_rate, m.trend) {
        writeln!(
            out,
            "| **Current Success Rate** | {current}% | {} |",
            rate_marker(current, th.warning, th.critical)
        )?;
        writeln!(
            out,
            "| **Average Success Rate** | {avg}% | {} |",
            if avg >= th.warning { "✅" } else { "⚠️" }
        )?;
        writeln!(out, "| **Trend** | {trend} | {} |", trend_marker(trend))?;
    } else {
        writeln!(out, "| **Current Success Rate** | n/a | ❔ |")?;
    }
    writeln!(
        out,
        "| **Volatility** | {}% | {} |",
        m.volatility,
        if m.volatility <= th.volatility { "✅" } else { "⚠️" }
    )?;
    writeln!(
        out,
        "| **Consecutive Failures** | {} | {} |\n",
        m.consecutive_failures,
        if m.consecutive_failures < th.consecutive_failures {
            "✅"
        } else {
            "⚠️"
        }
    )?;

    if r.alerts.is_empty() {
        writeln!(out, "## System Health\n")?;
        writeln!(
            out,
            "No degradation alerts detected. The healing system is functioning within normal parameters.\n"
        )?;
    } else {
        writeln!(out, "## Active Alerts\n")?;
        for alert in &r.alerts {
            writeln!(
                out,
                "### {}: {}\n",
                alert.severity.as_str().to_uppercase(),
                alert.title
            )?;
            writeln!(out, "{}\n", alert.message)?;
            if !alert.details.is_null() {
                writeln!(out, "```json")?;
                writeln!(
                    out,
                    "{}",
                    serde_json::to_string_pretty(&alert.details).unwrap_or_default()
                )?;
                writeln!(out, "```\n")?;
            }
        }

        writeln!(out, "## Immediate Actions Required\n")?;
        for (severity, heading) in [
            (Severity::Critical, "Critical Actions (Immediate)"),
            (Severity::Warning, "Warning Actions (Within 24 Hours)"),
        ] {
            let alerts: Vec<&Alert> = r.alerts.iter().filter(|a| a.severity == severity).collect();
            if alerts.is_empty() {
                continue;
            }
            writeln!(out, "### {heading}\n")?;
            for alert in alerts {
                writeln!(out, "**{}**", alert.title)?;
                for step in action_plan(alert) {
                    writeln!(out, "- {step}")?;
                }
                writeln!(out)?;
            }
        }
    }

    let focus: BTreeSet<&str> = r.alerts.iter().filter_map(|a| focus_area(a.kind)).collect();
    writeln!(out, "## Monitoring Recommendations\n")?;
    writeln!(
        out,
        "1. **Frequency**: {}",
        if r.alert_count > 0 {
            "increase monitoring to every 4 hours until alerts resolve"
        } else {
            "continue twice-daily monitoring"
        }
    )?;
    writeln!(
        out,
        "2. **Focus Areas**: {}",
        if focus.is_empty() {
            "general health monitoring".to_string()
        } else {
            focus.into_iter().collect::<Vec<_>>().join(", ")
        }
    )?;
    writeln!(
        out,
        "3. **Thresholds**: {}",
        if r.critical_alerts > 0 {
            "consider temporary threshold adjustments during investigation"
        } else {
            "current thresholds appear appropriate"
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::detect::DegradationChecker;
    use crate::storage::{RunHistory, RunRecord};
    use chrono::{Duration, TimeZone, Utc};

    fn report(rates: &[f64]) -> DegradationReport {
        let now = Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap();
        let cfg = Config::default();
        let mut h = RunHistory::default();
        for (i, &r) in rates.iter().enumerate() {
            h.append(
                RunRecord::from_rate(now - Duration::hours((rates.len() - i) as i64), r),
                &cfg.analysis,
            )
            .unwrap();
        }
        DegradationChecker::new(&cfg).check(&h, now)
    }

    #[test]
    fn test_healthy_report() {
        let body = render(&report(&[85.0, 86.0, 85.5]), &Thresholds::default());
        assert!(body.starts_with("# Healing Degradation Alert Report ✅"));
        assert!(body.contains("## System Health"));
        assert!(body.contains("general health monitoring"));
    }

    #[test]
    fn test_sharp_drop_gets_action_plan() {
        let body = render(
            &report(&[90.0, 88.0, 89.0, 60.0, 58.0, 55.0]),
            &Thresholds::default(),
        );
        assert!(body.contains("**Status**: ALERTS-DETECTED 🚨"));
        assert!(body.contains("### Critical Actions (Immediate)"));
        assert!(body.contains("**Rollback consideration**"));
        assert!(body.contains("change correlation"));
    }
}
