//! `trend-analysis-<date>.md`.

use std::fmt::{self, Write};

use crate::analysis::trend::{PeriodStats, TrendAnalysis};

pub fn render(analysis: &TrendAnalysis) -> String {
    let mut out = String::new();
    let _ = write(&mut out, analysis);
    out
}

fn period_row(out: &mut String, label: &str, p: &PeriodStats) -> fmt::Result {
    writeln!(
        out,
        "| **{label}** | {} | {}% | {}% | {}% | {} |",
        p.count,
        p.average,
        p.min,
        p.max,
        p.trend.as_str()
    )
}

/// Label of the first band whose upper limit `value` does not exceed.
fn consistency(value: f64, bands: &[(f64, &'static str)], fallback: &'static str) -> &'static str {
    bands
        .iter()
        .find(|(limit, _)| value <= *limit)
        .map_or(fallback, |(_, label)| *label)
}

fn write(out: &mut String, a: &TrendAnalysis) -> fmt::Result {
    let s = &a.summary;
    let h = &a.healing;

    writeln!(out, "# Healing Trend Analysis Report\n")?;
    writeln!(out, "*Generated: {}*\n", a.generated_at.to_rfc3339())?;

    writeln!(out, "## Executive Summary\n")?;
    writeln!(out, "- **Total Monitoring Runs**: {}", s.total_runs)?;
    if let Some(range) = &s.date_range {
        writeln!(out, "- **Date Range**: {} to {}", range.from, range.to)?;
    }
    writeln!(
        out,
        "- **Overall Trend**: {} ({}% confidence)",
        s.overall_trend.direction.as_str(),
        s.overall_trend.confidence
    )?;
    writeln!(out, "- **Volatility**: {}% standard deviation", s.volatility)?;
    writeln!(out, "- **Recent Volatility**: {}%", s.recent_volatility)?;
    writeln!(out, "- **Interpretation**: {}\n", s.overall_trend.interpretation)?;

    writeln!(out, "## Trend Analysis\n")?;
    writeln!(out, "### Overall Performance Trend")?;
    writeln!(out, "- **Direction**: {}", s.overall_trend.direction.as_str())?;
    writeln!(
        out,
        "- **Slope**: {} percentage points per run",
        s.overall_trend.slope
    )?;
    writeln!(out, "- **Confidence**: {}%\n", s.overall_trend.confidence)?;

    writeln!(out, "### Period Analysis")?;
    writeln!(out, "| Period | Runs | Average | Min | Max | Trend |")?;
    writeln!(out, "|--------|------|---------|-----|-----|-------|")?;
    period_row(out, "Last 7 Days", &a.periods.last7_days)?;
    period_row(out, "Last 30 Days", &a.periods.last30_days)?;
    period_row(out, "Last 90 Days", &a.periods.last90_days)?;
    writeln!(out)?;

    writeln!(out, "## Healing Effectiveness\n")?;
    writeln!(out, "### Target Achievement ({}% Success Rate)", h.target)?;
    writeln!(
        out,
        "- **Runs Meeting Target**: {}/{} ({}%)",
        h.target_achievement.runs_at_target, s.total_runs, h.target_achievement.percentage_at_target
    )?;
    writeln!(
        out,
        "- **Current Target Streak**: {}",
        h.stability.current_target_streak
    )?;
    writeln!(
        out,
        "- **Longest Target Streak**: {}",
        h.stability.consecutive_target_runs
    )?;
    writeln!(
        out,
        "- **Longest Stable Streak**: {} runs\n",
        h.stability.longest_stable_streak
    )?;

    let imp = &h.improvement_from_baseline;
    writeln!(out, "### Improvement from Baseline ({}% before healing)", h.baseline)?;
    writeln!(
        out,
        "- **Average Improvement**: {:+} percentage points",
        imp.average_improvement
    )?;
    writeln!(
        out,
        "- **Best Improvement**: {:+} percentage points",
        imp.max_improvement
    )?;
    writeln!(
        out,
        "- **Worst Performance**: {:+} percentage points\n",
        imp.min_improvement
    )?;

    let d = &a.patterns.success_rate_distribution;
    writeln!(out, "## Success Rate Distribution\n")?;
    writeln!(out, "| Category | Count | Percentage |")?;
    writeln!(out, "|----------|-------|------------|")?;
    for (label, bucket) in [
        ("Excellent (≥85%)", &d.excellent),
        ("Good (80-84%)", &d.good),
        ("Acceptable (75-79%)", &d.acceptable),
        ("Poor (70-74%)", &d.poor),
        ("Critical (<70%)", &d.critical),
    ] {
        writeln!(
            out,
            "| **{label}** | {} | {}% |",
            bucket.count, bucket.percentage
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Pattern Analysis\n")?;
    writeln!(out, "### Daily Patterns (by UTC hour)")?;
    if a.patterns.daily_patterns.is_empty() {
        writeln!(out, "No daily patterns detected (insufficient data)")?;
    }
    for (hour, b) in &a.patterns.daily_patterns {
        writeln!(
            out,
            "- **{hour:02}:00**: {} runs, avg {}%",
            b.count, b.average_rate
        )?;
    }
    writeln!(out, "\n### Weekly Patterns")?;
    if a.patterns.weekly_patterns.is_empty() {
        writeln!(out, "No weekly patterns detected (insufficient data)")?;
    }
    for w in &a.patterns.weekly_patterns {
        writeln!(
            out,
            "- **{}**: {} runs, avg {}%",
            w.day, w.stats.count, w.stats.average_rate
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Anomalies Detected\n")?;
    if a.patterns.anomalies.is_empty() {
        writeln!(out, "No significant anomalies detected")?;
    }
    for an in &a.patterns.anomalies {
        writeln!(
            out,
            "- **{}** ({:?}): {}% ({} point deviation, {}σ, {:?} severity)",
            an.date, an.kind, an.success_rate, an.deviation, an.sigmas, an.severity
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Recommendations\n")?;
    if a.recommendations.is_empty() {
        writeln!(
            out,
            "No specific recommendations at this time. Continue monitoring for trends."
        )?;
    }
    for rec in &a.recommendations {
        writeln!(
            out,
            "### {}: {}\n",
            rec.priority.as_str().to_uppercase(),
            rec.title
        )?;
        writeln!(out, "{}\n", rec.description)?;
        writeln!(out, "**Recommended Actions:**")?;
        for action in &rec.actions {
            writeln!(out, "- {action}")?;
        }
        writeln!(out)?;
    }

    let pct = h.target_achievement.percentage_at_target;
    writeln!(out, "## Key Insights\n")?;
    writeln!(
        out,
        "1. **Healing Effectiveness**: success rates sit {:+} points from the {}% baseline on average.",
        imp.average_improvement, h.baseline
    )?;
    writeln!(
        out,
        "2. **Stability Assessment**: {pct}% of runs meet the {}% target, indicating {} healing stability.",
        h.target,
        if pct >= 70 {
            "good"
        } else if pct >= 50 {
            "moderate"
        } else {
            "poor"
        }
    )?;
    writeln!(
        out,
        "3. **Trend Direction**: {} with {}% confidence, {}.",
        s.overall_trend.direction.as_str(),
        s.overall_trend.confidence,
        if s.overall_trend.confidence >= 70 {
            "a reliable signal"
        } else {
            "keep monitoring for a conclusive pattern"
        }
    )?;
    writeln!(
        out,
        "4. **Volatility Impact**: {}% volatility indicates {} result consistency.",
        s.volatility,
        consistency(
            s.volatility,
            &[(3.0, "excellent"), (5.0, "good"), (8.0, "moderate")],
            "high"
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TrendEngine;
    use crate::config::AnalysisConfig;
    use crate::storage::RunRecord;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_declining_history_report() {
        let now = Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap();
        let runs: Vec<RunRecord> = (0..15)
            .map(|i| RunRecord::from_rate(now - Duration::hours(15 - i), 95.0 - 2.5 * i as f64))
            .collect();
        let analysis = TrendEngine::new(&AnalysisConfig::default()).analyze(&runs, now);
        let body = render(&analysis);

        assert!(body.contains("- **Overall Trend**: degrading (100% confidence)"));
        assert!(body.contains("- **Slope**: -2.5 percentage points per run"));
        assert!(body.contains("| **Last 7 Days** | 15 |"));
        assert!(body.contains("### HIGH:"));
        assert!(body.contains("indicating poor healing stability"));
    }

    #[test]
    fn test_empty_history_report() {
        let now = Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap();
        let analysis = TrendEngine::new(&AnalysisConfig::default()).analyze(&[], now);
        let body = render(&analysis);
        assert!(body.contains("No daily patterns detected"));
        assert!(body.contains("No significant anomalies detected"));
        assert!(!body.contains("Date Range"));
    }
}
