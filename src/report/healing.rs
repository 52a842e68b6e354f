//! `healing-report-<date>.md`, written after every monitoring cycle.

use std::fmt::{self, Write};

use super::{rate_marker, trend_marker};
use crate::analysis::{FailureAnalysis, TrendLabel};
use crate::config::Config;
use crate::monitor::MonitorResults;
use crate::runner::SuiteStatus;
use crate::storage::RunHistory;

/// Execution time above which the cycle is flagged as slow.
const SLOW_CYCLE_SECS: u64 = 300;
/// Failed tests listed individually before the rest are summarised.
const LISTED_FAILURES: usize = 5;

pub fn render(
    results: &MonitorResults,
    history: &RunHistory,
    failures: &FailureAnalysis,
    cfg: &Config,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write(&mut out, results, history, failures, cfg);
    out
}

fn write(
    out: &mut String,
    results: &MonitorResults,
    history: &RunHistory,
    failures: &FailureAnalysis,
    cfg: &Config,
) -> fmt::Result {
    let a = &cfg.analysis;
    let rate = results.overall.success_rate;
    let summary = history.summary_or_compute(a);
    let trend = summary.as_ref().map_or(TrendLabel::Stable, |s| s.trend);

    writeln!(out, "# Healing Success Report - {}\n", results.date)?;
    writeln!(out, "## Test Suite Health Summary\n")?;
    writeln!(out, "| Metric | Current | Target | Status |")?;
    writeln!(out, "|--------|---------|--------|--------|")?;
    writeln!(
        out,
        "| **Overall Success Rate** | {rate}% | {}% | {} |",
        a.target,
        rate_marker(rate, a.target, a.minimum)
    )?;
    for (name, suite) in &results.suites {
        let marker = match suite.status {
            SuiteStatus::Pass => "✅",
            SuiteStatus::Unknown | SuiteStatus::Error => "❌",
            SuiteStatus::Fail => rate_marker(suite.success_rate(), a.target, a.minimum),
        };
        writeln!(
            out,
            "| **{name}** | {}/{} | {}% | {marker} |",
            suite.passed,
            suite.total(),
            a.target
        )?;
    }
    writeln!(
        out,
        "| **Execution Time** | {}s | <{SLOW_CYCLE_SECS}s | {} |\n",
        results.overall.execution_time,
        if results.overall.execution_time < SLOW_CYCLE_SECS {
            "✅"
        } else {
            "⚠️"
        }
    )?;

    let notes: Vec<_> = results
        .suites
        .values()
        .filter_map(|s| s.note.as_ref().map(|n| (&s.suite, n)))
        .collect();
    if !notes.is_empty() {
        for (suite, note) in notes {
            writeln!(out, "> **{suite}**: {note}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Trend Analysis\n")?;
    writeln!(out, "- **Current Trend**: {trend} ({})", trend_marker(trend))?;
    if let Some(s) = &summary {
        writeln!(
            out,
            "- **{}-Run Average**: {}%",
            a.summary_window, s.average_success_rate
        )?;
        writeln!(out, "- **Total Monitoring Runs**: {}", s.total_runs)?;
    }
    writeln!(out)?;

    writeln!(out, "## Failed Test Patterns\n")?;
    if failures.total_failed == 0 {
        writeln!(out, "✅ **No failed test patterns detected**\n")?;
    } else {
        let listed = results
            .suites
            .values()
            .flat_map(|s| s.failed_tests.iter())
            .take(LISTED_FAILURES);
        for test in listed {
            writeln!(out, "- **{}** ({})", test.title, test.file)?;
            writeln!(
                out,
                "  - Error: {}",
                test.error.lines().next().unwrap_or_default()
            )?;
        }
        if failures.total_failed > LISTED_FAILURES {
            writeln!(
                out,
                "\n_... and {} more failures_",
                failures.total_failed - LISTED_FAILURES
            )?;
        }

        writeln!(out, "\n### By Category\n")?;
        for (category, entries) in &failures.by_category {
            writeln!(out, "- **{category}**: {}", entries.len())?;
        }

        if !failures.recurring.is_empty() {
            writeln!(out, "\n### Recurring Errors\n")?;
            for pattern in &failures.recurring {
                writeln!(
                    out,
                    "- {}x `{}` ({})",
                    pattern.count, pattern.signature, pattern.category
                )?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "## Alert Conditions\n")?;
    if rate < a.minimum {
        writeln!(
            out,
            "🚨 **CRITICAL**: Success rate below minimum threshold ({}%)",
            a.minimum
        )?;
    } else if rate < a.target {
        writeln!(out, "⚠️ **WARNING**: Success rate below target ({}%)", a.target)?;
    }
    if trend == TrendLabel::Degrading {
        writeln!(out, "📉 **ATTENTION**: Degrading trend detected")?;
    }
    if rate >= a.target && trend != TrendLabel::Degrading {
        writeln!(out, "✅ **HEALTHY**: All metrics within target ranges")?;
    }
    writeln!(out)?;

    writeln!(out, "## Recommended Actions\n")?;
    let (heading, actions) = if rate < a.minimum {
        (
            "Immediate Actions Required",
            [
                "**Investigate critical failures** in the browser suite",
                "**Review recent code changes** that may have affected test stability",
                "**Apply additional healing patterns** for new failure modes",
                "**Consider temporary test adjustments** while issues are resolved",
            ],
        )
    } else if rate < a.target {
        (
            "Optimization Opportunities",
            [
                "**Analyze failed test patterns** for new healing opportunities",
                "**Review healing rule effectiveness** for edge cases",
                "**Consider tolerance adjustments** for borderline failures",
                "**Monitor for recurring failure patterns**",
            ],
        )
    } else {
        (
            "Maintenance Actions",
            [
                "**Continue monitoring** for stability",
                "**Document successful patterns** for team knowledge sharing",
                "**Consider expanding healing coverage** to other test areas",
                "**Review performance optimizations** for execution time",
            ],
        )
    };
    writeln!(out, "### {heading}\n")?;
    for (i, action) in actions.iter().enumerate() {
        writeln!(out, "{}. {action}", i + 1)?;
    }

    writeln!(out, "\n---")?;
    writeln!(
        out,
        "*Generated by healwatch monitor at {}*",
        results.timestamp.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{FailedTest, RunOutcome};
    use crate::storage::RunRecord;
    use chrono::{TimeZone, Utc};

    fn results(passed: u32, failed: u32) -> MonitorResults {
        let mut browser = RunOutcome::new("playwright", passed, failed, 120);
        browser.failed_tests = (0..failed.min(7))
            .map(|i| FailedTest {
                title: format!("case {i}"),
                file: "home.spec.ts".into(),
                error: "strict mode violation: locator resolved to 2 elements\n  at line 4".into(),
            })
            .collect();
        MonitorResults::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
            vec![browser],
        )
    }

    fn history(r: &MonitorResults) -> RunHistory {
        let mut h = RunHistory::default();
        h.append(r.record(), &Config::default().analysis).unwrap();
        h
    }

    #[test]
    fn test_healthy_report() {
        let r = results(100, 0);
        let body = render(&r, &history(&r), &r.failures(), &Config::default());
        assert!(body.starts_with("# Healing Success Report - 2026-06-01"));
        assert!(body.contains("No failed test patterns detected"));
        assert!(body.contains("**HEALTHY**"));
        assert!(body.contains("### Maintenance Actions"));
    }

    #[test]
    fn test_critical_report_lists_failures() {
        let r = results(60, 40);
        let body = render(&r, &history(&r), &r.failures(), &Config::default());
        assert!(body.contains("**CRITICAL**"));
        assert!(body.contains("### Immediate Actions Required"));
        assert!(body.contains("- **case 0** (home.spec.ts)"));
        assert!(!body.contains("at line 4"));
        assert!(body.contains("_... and 2 more failures_"));
        assert!(body.contains("**Strict Mode Violation**: 7"));
        assert!(body.contains("### Recurring Errors"));
    }

    #[test]
    fn test_placeholder_note_is_surfaced() {
        let outcome = RunOutcome::placeholder(
            "visual",
            15,
            SuiteStatus::Error,
            "`npm run test:visual` timed out after 300s",
        );
        let r = MonitorResults::new(Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(), vec![outcome]);
        let mut h = RunHistory::default();
        h.append(RunRecord::from_rate(r.timestamp, 0.0), &Config::default().analysis)
            .unwrap();
        let body = render(&r, &h, &r.failures(), &Config::default());
        assert!(body.contains("| **visual** | 0/15 | 81.1% | ❌ |"));
        assert!(body.contains("timed out after 300s"));
    }
}
