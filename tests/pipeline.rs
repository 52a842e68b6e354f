//! End-to-end: a declining history ending in a collapse, run through the
//! summary, trend engine, degradation rules and alert dispatch.

use chrono::{DateTime, Duration, TimeZone, Utc};
use healwatch::analysis::trend::{AnomalyKind, AnomalySeverity, Direction};
use healwatch::analysis::{TrendEngine, TrendLabel};
use healwatch::config::Config;
use healwatch::detect::degradation::ReportStatus;
use healwatch::detect::{AlertAnalyzer, AlertKind, DegradationChecker, Severity};
use healwatch::notify::{DispatchOutcome, Dispatcher};
use healwatch::pipeline;
use healwatch::storage::{AlertLog, MetricsStore, RunHistory, RunRecord};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
}

fn test_config(dir: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.metrics_dir = dir.join("metrics");
    cfg.paths.reports_dir = dir.join("reports");
    cfg.paths.alerts_dir = dir.join("alerts");
    cfg.channels.console = false;
    cfg
}

/// 14 hourly runs sliding from 95% down to 62.5%, then one at 20%.
fn collapsing_history(cfg: &Config) -> RunHistory {
    let mut rates: Vec<f64> = (0..14).map(|i| 95.0 - 2.5 * i as f64).collect();
    rates.push(20.0);

    let start = now() - Duration::hours(rates.len() as i64);
    let mut history = RunHistory::default();
    for (i, rate) in rates.into_iter().enumerate() {
        let record = RunRecord::from_rate(start + Duration::hours(i as i64), rate);
        history.append(record, &cfg.analysis).unwrap();
    }
    history
}

#[test]
fn test_summary_tracks_collapse() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let history = collapsing_history(&cfg);

    let summary = history.summary.as_ref().unwrap();
    assert_eq!(summary.total_runs, 15);
    assert_eq!(summary.current_success_rate, 20.0);
    assert_eq!(summary.trend, TrendLabel::Degrading);
}

#[test]
fn test_trend_engine_flags_degradation_and_anomaly() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let history = collapsing_history(&cfg);

    let analysis = TrendEngine::new(&cfg.analysis).analyze(&history.runs, now());
    let trend = &analysis.summary.overall_trend;
    assert_eq!(trend.direction, Direction::Degrading);
    assert!(trend.slope < 0.0);
    assert!(trend.confidence > 60, "confidence was {}", trend.confidence);

    let lowest = analysis
        .patterns
        .anomalies
        .iter()
        .find(|a| a.success_rate == 20.0)
        .expect("lowest run should be an anomaly");
    assert_eq!(lowest.kind, AnomalyKind::Negative);
    assert_eq!(lowest.severity, AnomalySeverity::High);
}

#[test]
fn test_degradation_rules_raise_critical() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let history = collapsing_history(&cfg);

    let report = DegradationChecker::new(&cfg).check(&history, now());
    assert_eq!(report.status, ReportStatus::AlertsDetected);
    assert!(report.critical_alerts >= 1);
    assert!(report
        .alerts
        .iter()
        .any(|a| a.kind == AlertKind::Critical && a.severity == Severity::Critical));
    assert!(report.alerts.iter().any(|a| a.kind == AlertKind::SharpDrop));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_alerts_respect_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let history = collapsing_history(&cfg);

    let mut dispatcher = Dispatcher::new(
        Vec::new(),
        AlertLog::new(cfg.paths.alert_history_file()),
        cfg.settings.cooldown(),
        cfg.settings.history_limit,
    );
    let analyzer = AlertAnalyzer::new(&cfg);

    let alerts = analyzer.analyze(&history, dispatcher.history(), now());
    assert!(alerts.iter().any(|a| a.kind == AlertKind::Critical));
    let first = dispatcher.dispatch_all(alerts, now()).await.unwrap();
    assert!(first
        .iter()
        .all(|o| matches!(o, DispatchOutcome::Delivered { .. })));

    // Ten minutes later the same conditions are still cooling down.
    let later = now() + Duration::minutes(10);
    let alerts = analyzer.analyze(&history, dispatcher.history(), later);
    let second = dispatcher.dispatch_all(alerts, later).await.unwrap();
    assert!(!second.is_empty());
    assert!(second.iter().all(|o| *o == DispatchOutcome::Suppressed));

    // The history survives a reload.
    let reloaded = AlertLog::new(cfg.paths.alert_history_file()).load_or_empty();
    assert_eq!(reloaded.len(), first.len());
}

#[tokio::test]
async fn test_commands_write_reports() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    MetricsStore::new(cfg.paths.cumulative_file())
        .save(&collapsing_history(&cfg))
        .unwrap();

    assert_eq!(pipeline::trends(&cfg, now(), false).unwrap(), 0);
    assert!(cfg
        .paths
        .reports_dir
        .join("trend-analysis-2026-03-15.md")
        .exists());

    assert_eq!(pipeline::check(&cfg, now(), false, false).await.unwrap(), 1);
    assert!(cfg
        .paths
        .reports_dir
        .join("degradation-alert-2026-03-15.md")
        .exists());

    assert_eq!(pipeline::alert(&cfg, now()).await.unwrap(), 1);
    assert!(cfg
        .paths
        .alerts_dir
        .join("alert-report-2026-03-15.md")
        .exists());
    assert!(cfg.paths.alert_history_file().exists());
}

#[test]
fn test_missing_history_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    assert!(pipeline::trends(&cfg, now(), false).is_err());
}
