//! General alert analysis: success-rate thresholds, degradation against the
//! previous window, recovery and consecutive failures.
//!
//! Recovery is the only rule that looks at the alert history; cooldown
//! suppression happens later, in the dispatcher.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{Alert, AlertKind, Severity};
use crate::analysis::stats::{self, round2, TimeSeries};
use crate::analysis::summary::TrendLabel;
use crate::config::{AlertSettings, AnalysisConfig, Config, NotificationsConfig, Thresholds};
use crate::storage::{AlertHistory, RunHistory};

/// Runs in each window compared by the degradation rule.
const DEGRADATION_WINDOW: usize = 3;
/// Fewest runs for the degradation comparison.
const MIN_DEGRADATION_RUNS: usize = 5;

#[derive(Debug, Clone)]
pub struct AlertAnalyzer {
    thresholds: Thresholds,
    notifications: NotificationsConfig,
    settings: AlertSettings,
    analysis: AnalysisConfig,
}

impl AlertAnalyzer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            thresholds: cfg.thresholds.clone(),
            notifications: cfg.notifications.clone(),
            settings: cfg.settings.clone(),
            analysis: cfg.analysis.clone(),
        }
    }

    /// Alerts raised by the current history. `sent` is the dispatched-alert
    /// history, consulted only for recovery.
    pub fn analyze(&self, history: &RunHistory, sent: &AlertHistory, now: DateTime<Utc>) -> Vec<Alert> {
        let Some(summary) = history.summary_or_compute(&self.analysis) else {
            return Vec::new();
        };
        let th = &self.thresholds;
        let series = TimeSeries::new(history.rates());
        let rate = summary.current_success_rate;
        let mut alerts = Vec::new();

        if rate < th.critical {
            if self.notifications.on_critical {
                alerts.push(Alert::new(
                    AlertKind::Critical,
                    Severity::Critical,
                    "Critical: Healing Success Rate Below Minimum",
                    format!(
                        "Current success rate ({rate}%) is below critical threshold ({}%)",
                        th.critical
                    ),
                    json!({
                        "current_rate": rate,
                        "threshold": th.critical,
                        "average_rate": summary.average_success_rate,
                        "trend": summary.trend,
                        "total_runs": summary.total_runs,
                    }),
                    now,
                ));
            }
        } else if rate < th.warning {
            alerts.push(Alert::new(
                AlertKind::Warning,
                Severity::Warning,
                "Warning: Healing Success Rate Below Target",
                format!(
                    "Current success rate ({rate}%) is below target threshold ({}%)",
                    th.warning
                ),
                json!({
                    "current_rate": rate,
                    "threshold": th.warning,
                    "average_rate": summary.average_success_rate,
                    "trend": summary.trend,
                }),
                now,
            ));
        }

        if summary.trend == TrendLabel::Degrading && self.notifications.on_degradation {
            let amount = degradation_amount(&series);
            if amount <= th.degradation {
                alerts.push(Alert::new(
                    AlertKind::Degradation,
                    Severity::Warning,
                    "Trend Alert: Healing Effectiveness Degrading",
                    format!(
                        "Healing success rate has degraded by {:.1} percentage points",
                        amount.abs()
                    ),
                    json!({
                        "current_rate": rate,
                        "degradation_amount": round2(amount),
                        "trend": summary.trend,
                        "threshold": th.degradation,
                    }),
                    now,
                ));
            }
        }

        if rate >= th.warning && self.notifications.on_recovery && self.recovery_due(sent, now) {
            alerts.push(Alert::new(
                AlertKind::Recovery,
                Severity::Info,
                "Recovery: Healing Success Rate Restored",
                format!("Success rate ({rate}%) has recovered above target threshold"),
                json!({
                    "current_rate": rate,
                    "threshold": th.warning,
                    "recovery_time": now,
                }),
                now,
            ));
        }

        let failures = series.trailing_below(th.warning);
        if failures >= th.consecutive_failures {
            alerts.push(Alert::new(
                AlertKind::ConsecutiveFailures,
                Severity::Critical,
                "Alert: Multiple Consecutive Test Failures",
                format!("{failures} consecutive runs below success threshold"),
                json!({
                    "consecutive_failures": failures,
                    "threshold": th.consecutive_failures,
                    "recent_rates": series.tail(failures),
                }),
                now,
            ));
        }

        alerts
    }

    /// A critical or warning alert went out within the recovery window and no
    /// recovery has been announced since.
    fn recovery_due(&self, sent: &AlertHistory, now: DateTime<Utc>) -> bool {
        let Some(last) = sent.last_of(&[AlertKind::Critical, AlertKind::Warning]) else {
            return false;
        };
        if last.timestamp <= now - self.settings.recovery_window() {
            return false;
        }
        !sent
            .since(last.timestamp)
            .any(|a| a.kind == AlertKind::Recovery)
    }
}

/// Mean of the last three runs minus the mean of the three before them;
/// 0 when there are too few runs to compare.
pub fn degradation_amount(series: &TimeSeries) -> f64 {
    if series.len() < MIN_DEGRADATION_RUNS {
        return 0.0;
    }
    let previous = series.window_before(DEGRADATION_WINDOW, DEGRADATION_WINDOW);
    if previous.is_empty() {
        return 0.0;
    }
    stats::mean(series.tail(DEGRADATION_WINDOW)) - stats::mean(previous)
}

/// 1 when any alert is critical.
pub fn exit_code(alerts: &[Alert]) -> i32 {
    if alerts.iter().any(Alert::is_critical) {
        1
    } else {
        0
    }
}
