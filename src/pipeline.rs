//! Command entry points. Each returns the process exit code; errors are left
//! to the caller, which logs them and writes the error log.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::analysis::TrendEngine;
use crate::config::Config;
use crate::detect::{alerting, AlertAnalyzer, DegradationChecker};
use crate::monitor::Monitor;
use crate::notify::{DispatchOutcome, Dispatcher};
use crate::report;
use crate::storage::{MetricsStore, RunHistory};

/// Load the run history, failing when it is missing or corrupt.
pub fn load_history(cfg: &Config) -> Result<RunHistory> {
    let store = MetricsStore::new(cfg.paths.cumulative_file());
    let history = store
        .load()
        .with_context(|| format!("cannot analyse {}", store.path().display()))?;
    info!(runs = history.len(), "run history loaded");
    Ok(history)
}

/// Run the suites, append the run and write the healing report.
pub async fn monitor(cfg: &Config, now: DateTime<Utc>) -> Result<i32> {
    let run = Monitor::from_config(cfg).run(now).await?;
    let o = &run.results.overall;
    println!(
        "Success rate: {}% ({}/{} passed, {}s)",
        o.success_rate, o.passed_tests, o.total_tests, o.execution_time
    );
    for suite in run.results.suites.values() {
        println!(
            "  {:<12} {:>4}/{:<4} {}",
            suite.suite,
            suite.passed,
            suite.total(),
            suite.status
        );
    }
    if let Some(summary) = &run.history.summary {
        println!(
            "Trend: {} | average {}% over {} runs",
            summary.trend, summary.average_success_rate, summary.total_runs
        );
    }
    println!("Report: {}", run.report.display());
    Ok(run.exit_code)
}

/// Long-run trend analysis and the trend report.
pub fn trends(cfg: &Config, now: DateTime<Utc>, json: bool) -> Result<i32> {
    let history = load_history(cfg)?;
    let analysis = TrendEngine::new(&cfg.analysis).analyze(&history.runs, now);
    let path = report::write_report(
        &cfg.paths.reports_dir,
        &format!("trend-analysis-{}.md", now.format("%Y-%m-%d")),
        &report::trend::render(&analysis),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        let t = &analysis.summary.overall_trend;
        println!(
            "Trend: {} (slope {}, {}% confidence)",
            t.direction.as_str(),
            t.slope,
            t.confidence
        );
        println!(
            "Volatility: {}% overall, {}% recent",
            analysis.summary.volatility, analysis.summary.recent_volatility
        );
        println!(
            "At target: {}% of {} runs",
            analysis.healing.target_achievement.percentage_at_target, analysis.summary.total_runs
        );
        for rec in &analysis.recommendations {
            println!("  [{}] {}", rec.priority.as_str(), rec.title);
        }
        println!("Report: {}", path.display());
    }
    Ok(0)
}

/// Degradation rules and the degradation report, optionally dispatching the
/// alerts through the cooldown gate.
pub async fn check(cfg: &Config, now: DateTime<Utc>, json: bool, dispatch: bool) -> Result<i32> {
    let history = load_history(cfg)?;
    let report = DegradationChecker::new(cfg).check(&history, now);
    let path = report::write_report(
        &cfg.paths.reports_dir,
        &format!("degradation-alert-{}.md", now.format("%Y-%m-%d")),
        &report::degradation::render(&report, &cfg.thresholds),
    )?;

    if dispatch && !report.alerts.is_empty() {
        let mut dispatcher = Dispatcher::from_config(cfg)?;
        dispatcher.dispatch_all(report.alerts.clone(), now).await?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Status: {} ({} critical, {} warning)",
            report.status.as_str(),
            report.critical_alerts,
            report.warning_alerts
        );
        for alert in &report.alerts {
            println!("  [{}] {}", alert.severity, alert.title);
        }
        println!("Report: {}", path.display());
    }
    Ok(report.exit_code())
}

/// General alert analysis with cooldown-gated dispatch and the alert report.
pub async fn alert(cfg: &Config, now: DateTime<Utc>) -> Result<i32> {
    let history = load_history(cfg)?;
    let mut dispatcher = Dispatcher::from_config(cfg)?;
    let alerts = AlertAnalyzer::new(cfg).analyze(&history, dispatcher.history(), now);
    let exit_code = alerting::exit_code(&alerts);

    if alerts.is_empty() {
        println!("All metrics within normal ranges");
    }
    let outcomes = dispatcher.dispatch_all(alerts, now).await?;
    let suppressed = outcomes
        .iter()
        .filter(|o| **o == DispatchOutcome::Suppressed)
        .count();
    info!(
        computed = outcomes.len(),
        suppressed,
        exit_code,
        "alert analysis complete"
    );

    let path = report::write_report(
        &cfg.paths.alerts_dir,
        &format!("alert-report-{}.md", now.format("%Y-%m-%d")),
        &report::alerts::render(dispatcher.history(), cfg, now),
    )?;
    println!("Report: {}", path.display());
    Ok(exit_code)
}

/// One scheduled cycle: monitor, then alert. Exit code is the worse of the two.
pub async fn run_cycle(cfg: &Config, now: DateTime<Utc>) -> Result<i32> {
    let monitored = monitor(cfg, now).await?;
    let alerted = alert(cfg, now).await?;
    Ok(monitored.max(alerted))
}
