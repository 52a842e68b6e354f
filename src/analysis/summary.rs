//! Rolling summary recomputed on every append, and the health status derived
//! from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::{self, round2, TimeSeries};
use crate::config::AnalysisConfig;
use crate::storage::RunRecord;

/// Qualitative direction of the recent success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Improving,
    Degrading,
    Stable,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Improving => "improving",
            TrendLabel::Degrading => "degrading",
            TrendLabel::Stable => "stable",
        }
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineRates {
    pub target: f64,
    pub minimum: f64,
}

/// Derived view of the run history. Never patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Timestamp of the most recent run.
    pub last_update: DateTime<Utc>,
    pub total_runs: usize,
    pub average_success_rate: f64,
    pub current_success_rate: f64,
    pub trend: TrendLabel,
    pub baseline: BaselineRates,
}

impl Summary {
    /// Compute the summary of `runs` (oldest first). `None` for an empty history.
    pub fn compute(runs: &[RunRecord], cfg: &AnalysisConfig) -> Option<Self> {
        let last = runs.last()?;
        let series = TimeSeries::new(runs.iter().map(|r| r.success_rate).collect());

        Some(Self {
            last_update: last.timestamp,
            total_runs: runs.len(),
            average_success_rate: round2(stats::mean(series.tail(cfg.summary_window.max(1)))),
            current_success_rate: last.success_rate,
            trend: summary_trend(&series, cfg),
            baseline: BaselineRates {
                target: cfg.target,
                minimum: cfg.minimum,
            },
        })
    }
}

/// Compare the mean of the last `trend_window` runs with the window before it.
/// Stable until both windows are full.
fn summary_trend(series: &TimeSeries, cfg: &AnalysisConfig) -> TrendLabel {
    let w = cfg.trend_window.max(1);
    if series.len() < 2 * w {
        return TrendLabel::Stable;
    }
    let change = stats::mean(series.tail(w)) - stats::mean(series.window_before(w, w));
    if change > cfg.stable_band {
        TrendLabel::Improving
    } else if change < -cfg.stable_band {
        TrendLabel::Degrading
    } else {
        TrendLabel::Stable
    }
}

/// Dashboard health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn health_status(summary: Option<&Summary>, cfg: &AnalysisConfig) -> HealthStatus {
    let Some(s) = summary else {
        return HealthStatus::Unknown;
    };
    let rate = s.current_success_rate;
    if rate >= cfg.target && s.trend != TrendLabel::Degrading {
        HealthStatus::Healthy
    } else if rate >= cfg.minimum {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn runs(rates: &[f64]) -> Vec<RunRecord> {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 6, 0, 0).unwrap();
        rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RunRecord::from_rate(t0 + Duration::hours(i as i64), r))
            .collect()
    }

    #[test]
    fn test_empty_history_has_no_summary() {
        assert!(Summary::compute(&[], &AnalysisConfig::default()).is_none());
    }

    #[test]
    fn test_short_history_is_always_stable() {
        let cfg = AnalysisConfig::default();
        for n in 1..10 {
            let rates: Vec<f64> = (0..n).map(|i| 100.0 - 10.0 * i as f64).collect();
            let s = Summary::compute(&runs(&rates), &cfg).unwrap();
            assert_eq!(s.trend, TrendLabel::Stable, "n = {n}");
        }
    }

    #[test]
    fn test_trend_compares_last_two_windows() {
        let cfg = AnalysisConfig::default();
        let mut rates = vec![90.0; 5];
        rates.extend([80.0; 5]);
        let s = Summary::compute(&runs(&rates), &cfg).unwrap();
        assert_eq!(s.trend, TrendLabel::Degrading);

        rates.reverse();
        let s = Summary::compute(&runs(&rates), &cfg).unwrap();
        assert_eq!(s.trend, TrendLabel::Improving);

        // A 2-point change sits in the dead zone.
        let mut rates = vec![80.0; 5];
        rates.extend([82.0; 5]);
        let s = Summary::compute(&runs(&rates), &cfg).unwrap();
        assert_eq!(s.trend, TrendLabel::Stable);
    }

    #[test]
    fn test_average_uses_last_ten() {
        let cfg = AnalysisConfig::default();
        let mut rates = vec![0.0; 5];
        rates.extend([85.0; 10]);
        let s = Summary::compute(&runs(&rates), &cfg).unwrap();
        assert_eq!(s.average_success_rate, 85.0);
        assert_eq!(s.current_success_rate, 85.0);
        assert_eq!(s.total_runs, 15);
        assert_eq!(s.baseline.target, 81.1);
    }

    #[test]
    fn test_health_status() {
        let cfg = AnalysisConfig::default();
        assert_eq!(health_status(None, &cfg), HealthStatus::Unknown);

        let s = Summary::compute(&runs(&[90.0]), &cfg).unwrap();
        assert_eq!(health_status(Some(&s), &cfg), HealthStatus::Healthy);

        let s = Summary::compute(&runs(&[78.0]), &cfg).unwrap();
        assert_eq!(health_status(Some(&s), &cfg), HealthStatus::Warning);

        let s = Summary::compute(&runs(&[60.0]), &cfg).unwrap();
        assert_eq!(health_status(Some(&s), &cfg), HealthStatus::Critical);

        let mut rates = vec![99.0; 5];
        rates.extend([85.0; 5]);
        let s = Summary::compute(&runs(&rates), &cfg).unwrap();
        assert_eq!(s.trend, TrendLabel::Degrading);
        assert_eq!(health_status(Some(&s), &cfg), HealthStatus::Warning);
    }
}
