//! Threshold rules over the run history.
//!
//! Every rule is evaluated independently on each check and any number of them
//! may fire together. The checker keeps its own statistics and does not share
//! intermediate state with the trend engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::{Alert, AlertKind, Severity};
use crate::analysis::stats::{round2, TimeSeries};
use crate::analysis::summary::TrendLabel;
use crate::config::{AnalysisConfig, Config, Thresholds};
use crate::storage::RunHistory;

/// Fewest runs for the sharp-drop comparison.
const MIN_SHARP_DROP_RUNS: usize = 5;
/// Largest window compared by the sharp-drop rule.
const MAX_SHARP_DROP_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Healthy,
    AlertsDetected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Healthy => "healthy",
            ReportStatus::AlertsDetected => "alerts-detected",
        }
    }
}

/// Snapshot of the values the rules looked at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradationMetrics {
    pub current_rate: Option<f64>,
    pub avg_rate: Option<f64>,
    pub trend: Option<TrendLabel>,
    pub volatility: f64,
    pub consecutive_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharpDrop {
    pub drop: f64,
    /// Runs in each compared window.
    pub period: usize,
    pub recent_avg: f64,
    pub previous_avg: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradationReport {
    pub timestamp: DateTime<Utc>,
    pub status: ReportStatus,
    pub alert_count: usize,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
    pub alerts: Vec<Alert>,
    pub metrics: DegradationMetrics,
}

impl DegradationReport {
    /// 1 when any alert is critical.
    pub fn exit_code(&self) -> i32 {
        if self.critical_alerts > 0 {
            1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
pub struct DegradationChecker {
    thresholds: Thresholds,
    analysis: AnalysisConfig,
}

impl DegradationChecker {
    pub fn new(cfg: &Config) -> Self {
        Self {
            thresholds: cfg.thresholds.clone(),
            analysis: cfg.analysis.clone(),
        }
    }

    pub fn check(&self, history: &RunHistory, now: DateTime<Utc>) -> DegradationReport {
        let th = &self.thresholds;
        let series = TimeSeries::new(history.rates());
        let summary = history.summary_or_compute(&self.analysis);
        let mut alerts = Vec::new();

        // With no runs there is no current rate to judge.
        if let Some(s) = &summary {
            let rate = s.current_success_rate;
            if rate < th.critical {
                alerts.push(Alert::new(
                    AlertKind::Critical,
                    Severity::Critical,
                    "Critical Success Rate Alert",
                    format!(
                        "Current success rate ({rate}%) has fallen below critical threshold ({}%)",
                        th.critical
                    ),
                    json!({
                        "currentRate": rate,
                        "threshold": th.critical,
                        "difference": round2(rate - th.critical),
                    }),
                    now,
                ));
            } else if rate < th.warning {
                alerts.push(Alert::new(
                    AlertKind::Warning,
                    Severity::Warning,
                    "Below Target Success Rate",
                    format!("Current success rate ({rate}%) is below target ({}%)", th.warning),
                    json!({
                        "currentRate": rate,
                        "threshold": th.warning,
                        "difference": round2(rate - th.warning),
                    }),
                    now,
                ));
            }

            if s.trend == TrendLabel::Degrading {
                alerts.push(Alert::new(
                    AlertKind::Trend,
                    Severity::Warning,
                    "Degrading Trend Detected",
                    "Test success rate shows a degrading trend pattern",
                    json!({
                        "trend": s.trend,
                        "avgRate": s.average_success_rate,
                        "currentRate": rate,
                    }),
                    now,
                ));
            }
        }

        let consecutive = series.trailing_below(th.warning);
        if consecutive >= th.consecutive_failures {
            let severity = if consecutive >= th.consecutive_critical {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(Alert::new(
                AlertKind::ConsecutiveFailures,
                severity,
                "Consecutive Failures Alert",
                format!("{consecutive} consecutive runs below warning threshold"),
                json!({
                    "consecutiveFailures": consecutive,
                    "threshold": th.consecutive_failures,
                    "warningThreshold": th.warning,
                }),
                now,
            ));
        }

        let volatility = series.volatility(self.analysis.volatility_window.max(1));
        if volatility > th.volatility {
            alerts.push(Alert::new(
                AlertKind::Volatility,
                Severity::Warning,
                "High Result Volatility",
                format!("Test results show high volatility ({volatility}% standard deviation)"),
                json!({ "volatility": volatility, "threshold": th.volatility }),
                now,
            ));
        }

        if let Some(drop) = self.sharp_drop(&series) {
            alerts.push(Alert::new(
                AlertKind::SharpDrop,
                Severity::Critical,
                "Sharp Success Rate Drop",
                format!(
                    "Detected significant drop in success rate: {}% in last {} runs",
                    drop.drop, drop.period
                ),
                serde_json::to_value(&drop).unwrap_or_default(),
                now,
            ));
        }

        let critical_alerts = alerts.iter().filter(|a| a.severity == Severity::Critical).count();
        let warning_alerts = alerts.iter().filter(|a| a.severity == Severity::Warning).count();
        debug!(
            runs = history.len(),
            alerts = alerts.len(),
            critical_alerts,
            "degradation rules evaluated"
        );

        DegradationReport {
            timestamp: now,
            status: if alerts.is_empty() {
                ReportStatus::Healthy
            } else {
                ReportStatus::AlertsDetected
            },
            alert_count: alerts.len(),
            critical_alerts,
            warning_alerts,
            alerts,
            metrics: DegradationMetrics {
                current_rate: summary.as_ref().map(|s| s.current_success_rate),
                avg_rate: summary.as_ref().map(|s| s.average_success_rate),
                trend: summary.as_ref().map(|s| s.trend),
                volatility,
                consecutive_failures: consecutive,
            },
        }
    }

    /// Mean of the last `k` runs against the `k` before them, with
    /// `k = min(3, n / 3)`.
    pub fn sharp_drop(&self, series: &TimeSeries) -> Option<SharpDrop> {
        let n = series.len();
        if n < MIN_SHARP_DROP_RUNS {
            return None;
        }
        let k = MAX_SHARP_DROP_WINDOW.min(n / 3);
        let recent = series.tail(k);
        let previous = series.window_before(k, k);
        if recent.is_empty() || previous.is_empty() {
            return None;
        }

        let recent_avg = crate::analysis::stats::mean(recent);
        let previous_avg = crate::analysis::stats::mean(previous);
        let drop = previous_avg - recent_avg;
        (drop > self.thresholds.sharp_drop).then(|| SharpDrop {
            drop: round2(drop),
            period: k,
            recent_avg: round2(recent_avg),
            previous_avg: round2(previous_avg),
        })
    }
}
