//! Long-run trend analysis over the bounded run history.
//!
//! Everything here is a pure function of the runs and an explicit `now`; the
//! engine never reads the stored summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use serde::Serialize;

use super::stats::{self, round2, round3, TimeSeries};
use crate::config::AnalysisConfig;
use crate::storage::RunRecord;

/// Regression slope (points per run) beyond which a trend is called.
const SLOPE_THRESHOLD: f64 = 0.1;
/// Half-width of the dead zone for first-half/second-half period trends.
const PERIOD_DEAD_ZONE: f64 = 1.0;
/// Fewest runs needed before outliers are looked for.
const MIN_ANOMALY_RUNS: usize = 5;
/// Long-run volatility above this earns a stability recommendation.
const RECOMMEND_VOLATILITY: f64 = 5.0;
/// Regression confidence above which a degrading trend earns a recommendation.
const RECOMMEND_CONFIDENCE: u32 = 60;
/// Share of runs at target (percent) below which healing coverage is flagged.
const RECOMMEND_TARGET_SHARE: u32 = 70;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub generated_at: DateTime<Utc>,
    pub summary: TrendSummary,
    pub periods: Periods,
    pub patterns: Patterns,
    pub healing: HealingEffectiveness,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub total_runs: usize,
    pub date_range: Option<DateRange>,
    pub overall_trend: OverallTrend,
    /// Standard deviation over the whole history.
    pub volatility: f64,
    /// Standard deviation over the configured recent window.
    pub recent_volatility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    fn of(runs: &[&RunRecord]) -> Option<Self> {
        Some(Self {
            from: runs.first()?.date,
            to: runs.last()?.date,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Improving,
    Degrading,
    Stable,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Improving => "improving",
            Direction::Degrading => "degrading",
            Direction::Stable => "stable",
            Direction::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallTrend {
    pub direction: Direction,
    /// Points per run, rounded to three decimals.
    pub slope: f64,
    /// `round(R² * 100)`.
    pub confidence: u32,
    pub interpretation: String,
}

impl OverallTrend {
    fn unknown() -> Self {
        Self {
            direction: Direction::Unknown,
            slope: 0.0,
            confidence: 0,
            interpretation: "Not enough runs to fit a trend".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodTrend {
    Improving,
    Degrading,
    Stable,
    InsufficientData,
    NoData,
}

impl PeriodTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodTrend::Improving => "improving",
            PeriodTrend::Degrading => "degrading",
            PeriodTrend::Stable => "stable",
            PeriodTrend::InsufficientData => "insufficient-data",
            PeriodTrend::NoData => "no-data",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub trend: PeriodTrend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<DateRange>,
}

impl PeriodStats {
    fn empty() -> Self {
        Self {
            count: 0,
            average: 0.0,
            min: 0.0,
            max: 0.0,
            trend: PeriodTrend::NoData,
            dates: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Periods {
    pub last7_days: PeriodStats,
    pub last30_days: PeriodStats,
    pub last90_days: PeriodStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub count: usize,
    pub percentage: u32,
}

/// Success-rate histogram. Each band includes its lower bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    /// ≥ 85
    pub excellent: Bucket,
    /// 80 to below 85
    pub good: Bucket,
    /// 75 to below 80
    pub acceptable: Bucket,
    /// 70 to below 75
    pub poor: Bucket,
    /// below 70
    pub critical: Bucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStats {
    pub count: usize,
    pub average_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl BucketStats {
    fn of(rates: &[f64]) -> Self {
        Self {
            count: rates.len(),
            average_rate: round2(stats::mean(rates)),
            min_rate: stats::min(rates),
            max_rate: stats::max(rates),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayStats {
    pub day: &'static str,
    #[serde(flatten)]
    pub stats: BucketStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub success_rate: f64,
    /// Absolute distance from the mean, in points.
    pub deviation: f64,
    pub sigmas: f64,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patterns {
    pub success_rate_distribution: Distribution,
    /// Keyed by UTC hour of day.
    pub daily_patterns: BTreeMap<u32, BucketStats>,
    /// Sunday first; days without runs are omitted.
    pub weekly_patterns: Vec<WeekdayStats>,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAchievement {
    pub runs_at_target: usize,
    pub percentage_at_target: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineImprovement {
    pub average_improvement: f64,
    pub min_improvement: f64,
    pub max_improvement: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stability {
    /// Longest run of consecutive target-meeting runs anywhere in the history.
    pub consecutive_target_runs: usize,
    /// Target-meeting runs counted back from the most recent one.
    pub current_target_streak: usize,
    /// Longest run within the stable band around the target.
    pub longest_stable_streak: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingEffectiveness {
    pub target: f64,
    pub baseline: f64,
    pub target_achievement: TargetAchievement,
    pub improvement_from_baseline: BaselineImprovement,
    pub stability: Stability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: &'static str,
    pub title: String,
    pub description: String,
    pub actions: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Regression, period, pattern and anomaly analysis.
#[derive(Debug, Clone)]
pub struct TrendEngine {
    cfg: AnalysisConfig,
}

impl TrendEngine {
    pub fn new(cfg: &AnalysisConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn analyze(&self, runs: &[RunRecord], now: DateTime<Utc>) -> TrendAnalysis {
        let series = TimeSeries::new(runs.iter().map(|r| r.success_rate).collect());
        let all: Vec<&RunRecord> = runs.iter().collect();

        let summary = TrendSummary {
            total_runs: runs.len(),
            date_range: DateRange::of(&all),
            overall_trend: overall_trend(&series),
            volatility: series.volatility(series.len()),
            recent_volatility: series.volatility(self.cfg.volatility_window.max(1)),
        };

        let periods = Periods {
            last7_days: period_stats(runs, now, 7),
            last30_days: period_stats(runs, now, 30),
            last90_days: period_stats(runs, now, 90),
        };

        let patterns = Patterns {
            success_rate_distribution: distribution(series.values()),
            daily_patterns: hourly_patterns(runs),
            weekly_patterns: weekly_patterns(runs),
            anomalies: self.anomalies(runs, &series),
        };

        let healing = self.healing_effectiveness(&series);

        let mut analysis = TrendAnalysis {
            generated_at: now,
            summary,
            periods,
            patterns,
            healing,
            recommendations: Vec::new(),
        };
        analysis.recommendations = self.recommendations(&analysis);
        analysis
    }

    /// Runs further than `anomaly_sigma` standard deviations from the mean.
    fn anomalies(&self, runs: &[RunRecord], series: &TimeSeries) -> Vec<Anomaly> {
        if series.len() < MIN_ANOMALY_RUNS {
            return Vec::new();
        }
        let mean = series.mean();
        runs.iter()
            .filter_map(|run| {
                let z = series.z_score(run.success_rate)?;
                if z.abs() <= self.cfg.anomaly_sigma {
                    return None;
                }
                Some(Anomaly {
                    timestamp: run.timestamp,
                    date: run.date,
                    success_rate: run.success_rate,
                    deviation: round2((run.success_rate - mean).abs()),
                    sigmas: round2(z.abs()),
                    kind: if run.success_rate > mean {
                        AnomalyKind::Positive
                    } else {
                        AnomalyKind::Negative
                    },
                    severity: if z.abs() > self.cfg.anomaly_high_sigma {
                        AnomalySeverity::High
                    } else {
                        AnomalySeverity::Medium
                    },
                })
            })
            .collect()
    }

    fn healing_effectiveness(&self, series: &TimeSeries) -> HealingEffectiveness {
        let target = self.cfg.target;
        let (lo, hi) = (target - self.cfg.target_band, target + self.cfg.target_band);
        let at_target = series.values().iter().filter(|&&v| v >= target).count();

        let improvement_from_baseline = if series.is_empty() {
            BaselineImprovement {
                average_improvement: 0.0,
                min_improvement: 0.0,
                max_improvement: 0.0,
            }
        } else {
            let base = self.cfg.healing_baseline;
            BaselineImprovement {
                average_improvement: round2(series.mean() - base),
                min_improvement: round2(stats::min(series.values()) - base),
                max_improvement: round2(stats::max(series.values()) - base),
            }
        };

        HealingEffectiveness {
            target,
            baseline: self.cfg.healing_baseline,
            target_achievement: TargetAchievement {
                runs_at_target: at_target,
                percentage_at_target: percentage(at_target, series.len()),
            },
            improvement_from_baseline,
            stability: Stability {
                consecutive_target_runs: series.longest_streak(|v| v >= target),
                current_target_streak: series.trailing_at_least(target),
                longest_stable_streak: series.longest_streak(|v| v >= lo && v <= hi),
            },
        }
    }

    fn recommendations(&self, a: &TrendAnalysis) -> Vec<Recommendation> {
        let mut recs = Vec::new();
        let trend = &a.summary.overall_trend;

        if trend.direction == Direction::Degrading && trend.confidence > RECOMMEND_CONFIDENCE {
            recs.push(Recommendation {
                priority: Priority::High,
                category: "trend",
                title: "Degrading Trend Detected".to_string(),
                description: format!(
                    "Success rate is falling by {} points per run with {}% confidence.",
                    trend.slope.abs(),
                    trend.confidence
                ),
                actions: vec![
                    "Review recent code changes for potential test impacts",
                    "Analyze failed test patterns for new healing opportunities",
                    "Consider temporary tolerance adjustments while investigating",
                    "Increase monitoring frequency to catch issues early",
                ],
            });
        }

        if a.summary.volatility > RECOMMEND_VOLATILITY {
            recs.push(Recommendation {
                priority: Priority::Medium,
                category: "stability",
                title: "High Test Result Volatility".to_string(),
                description: format!(
                    "Test results show high volatility ({}% std dev).",
                    a.summary.volatility
                ),
                actions: vec![
                    "Investigate flaky test patterns",
                    "Review test environment stability",
                    "Consider adding retry mechanisms for unstable tests",
                    "Analyze infrastructure factors affecting test consistency",
                ],
            });
        }

        let recent = [&a.periods.last7_days, &a.periods.last30_days]
            .into_iter()
            .find(|p| p.count > 0)
            .map(|p| p.average);
        if let Some(avg) = recent {
            if avg < self.cfg.minimum {
                recs.push(Recommendation {
                    priority: Priority::Critical,
                    category: "success-rate",
                    title: "Critical Success Rate".to_string(),
                    description: format!(
                        "Recent average success rate ({avg}%) below minimum threshold ({}%).",
                        self.cfg.minimum
                    ),
                    actions: vec![
                        "Immediate investigation of critical failures required",
                        "Apply emergency healing patterns for recurring failures",
                        "Consider disabling unstable tests temporarily",
                        "Escalate to development team for urgent fixes",
                    ],
                });
            } else if avg < self.cfg.target {
                recs.push(Recommendation {
                    priority: Priority::Medium,
                    category: "success-rate",
                    title: "Below Target Success Rate".to_string(),
                    description: format!(
                        "Recent average success rate ({avg}%) below target ({}%).",
                        self.cfg.target
                    ),
                    actions: vec![
                        "Analyze failed test patterns for healing opportunities",
                        "Review healing rule effectiveness",
                        "Consider expanding healing coverage",
                        "Monitor for emerging failure patterns",
                    ],
                });
            }
        }

        let high = a
            .patterns
            .anomalies
            .iter()
            .filter(|x| x.severity == AnomalySeverity::High)
            .count();
        if high > 0 {
            recs.push(Recommendation {
                priority: Priority::High,
                category: "anomalies",
                title: "Significant Anomalies Detected".to_string(),
                description: format!("{high} high-severity anomalies detected in test results."),
                actions: vec![
                    "Investigate causes of extreme success rate variations",
                    "Review system changes during anomaly periods",
                    "Check for infrastructure or environmental factors",
                    "Consider adding monitoring for anomaly triggers",
                ],
            });
        }

        let share = a.healing.target_achievement.percentage_at_target;
        if a.summary.total_runs > 0 && share < RECOMMEND_TARGET_SHARE {
            recs.push(Recommendation {
                priority: Priority::Medium,
                category: "healing",
                title: "Healing Target Achievement Low".to_string(),
                description: format!("Only {share}% of runs meet the healing target."),
                actions: vec![
                    "Review and update healing patterns",
                    "Identify new failure modes requiring healing",
                    "Consider adjusting healing tolerances",
                    "Expand healing coverage to additional test scenarios",
                ],
            });
        }

        recs.sort_by_key(|r| r.priority);
        recs
    }
}

fn overall_trend(series: &TimeSeries) -> OverallTrend {
    let Some(fit) = series.linear_fit() else {
        return OverallTrend::unknown();
    };
    let direction = if fit.slope > SLOPE_THRESHOLD {
        Direction::Improving
    } else if fit.slope < -SLOPE_THRESHOLD {
        Direction::Degrading
    } else {
        Direction::Stable
    };
    OverallTrend {
        direction,
        slope: round3(fit.slope),
        confidence: (fit.r_squared * 100.0).round() as u32,
        interpretation: interpret(fit.r_squared).to_string(),
    }
}

fn interpret(r_squared: f64) -> &'static str {
    if r_squared < 0.3 {
        "High variability, trend uncertain"
    } else if r_squared < 0.6 {
        "Moderate correlation, trend somewhat reliable"
    } else {
        "Strong correlation, trend highly reliable"
    }
}

/// Stats for runs whose timestamp falls within `days` before `now`.
fn period_stats(runs: &[RunRecord], now: DateTime<Utc>, days: i64) -> PeriodStats {
    let cutoff = now - Duration::days(days);
    let window: Vec<&RunRecord> = runs.iter().filter(|r| r.timestamp >= cutoff).collect();
    if window.is_empty() {
        return PeriodStats::empty();
    }
    let rates: Vec<f64> = window.iter().map(|r| r.success_rate).collect();
    PeriodStats {
        count: rates.len(),
        average: round2(stats::mean(&rates)),
        min: stats::min(&rates),
        max: stats::max(&rates),
        trend: period_trend(&rates),
        dates: DateRange::of(&window),
    }
}

/// First-half versus second-half mean. The middle run of an odd-length
/// window belongs to the second half.
fn period_trend(rates: &[f64]) -> PeriodTrend {
    if rates.len() < 3 {
        return PeriodTrend::InsufficientData;
    }
    let (first, second) = rates.split_at(rates.len() / 2);
    let change = stats::mean(second) - stats::mean(first);
    if change > PERIOD_DEAD_ZONE {
        PeriodTrend::Improving
    } else if change < -PERIOD_DEAD_ZONE {
        PeriodTrend::Degrading
    } else {
        PeriodTrend::Stable
    }
}

fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * count as f64 / total as f64).round() as u32
}

pub fn distribution(rates: &[f64]) -> Distribution {
    let mut d = Distribution::default();
    for &rate in rates {
        let bucket = if rate >= 85.0 {
            &mut d.excellent
        } else if rate >= 80.0 {
            &mut d.good
        } else if rate >= 75.0 {
            &mut d.acceptable
        } else if rate >= 70.0 {
            &mut d.poor
        } else {
            &mut d.critical
        };
        bucket.count += 1;
    }
    let total = rates.len();
    for b in [
        &mut d.excellent,
        &mut d.good,
        &mut d.acceptable,
        &mut d.poor,
        &mut d.critical,
    ] {
        b.percentage = percentage(b.count, total);
    }
    d
}

fn hourly_patterns(runs: &[RunRecord]) -> BTreeMap<u32, BucketStats> {
    let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for run in runs {
        by_hour
            .entry(run.timestamp.hour())
            .or_default()
            .push(run.success_rate);
    }
    by_hour
        .into_iter()
        .map(|(hour, rates)| (hour, BucketStats::of(&rates)))
        .collect()
}

const WEEK: [(Weekday, &str); 7] = [
    (Weekday::Sun, "Sunday"),
    (Weekday::Mon, "Monday"),
    (Weekday::Tue, "Tuesday"),
    (Weekday::Wed, "Wednesday"),
    (Weekday::Thu, "Thursday"),
    (Weekday::Fri, "Friday"),
    (Weekday::Sat, "Saturday"),
];

fn weekly_patterns(runs: &[RunRecord]) -> Vec<WeekdayStats> {
    WEEK.iter()
        .filter_map(|&(weekday, day)| {
            let rates: Vec<f64> = runs
                .iter()
                .filter(|r| r.timestamp.weekday() == weekday)
                .map(|r| r.success_rate)
                .collect();
            (!rates.is_empty()).then(|| WeekdayStats {
                day,
                stats: BucketStats::of(&rates),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    /// One run per hour, the last one an hour before `now()`.
    fn hourly(rates: &[f64]) -> Vec<RunRecord> {
        let n = rates.len() as i64;
        rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RunRecord::from_rate(now() - Duration::hours(n - i as i64), r))
            .collect()
    }

    fn engine() -> TrendEngine {
        TrendEngine::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_identical_rates_are_stable_with_zero_volatility() {
        let a = engine().analyze(&hourly(&[82.0; 8]), now());
        assert_eq!(a.summary.overall_trend.direction, Direction::Stable);
        assert_eq!(a.summary.overall_trend.confidence, 0);
        assert_eq!(a.summary.volatility, 0.0);
        assert!(a.patterns.anomalies.is_empty());
    }

    #[test]
    fn test_single_run_trend_is_unknown() {
        let a = engine().analyze(&hourly(&[82.0]), now());
        assert_eq!(a.summary.overall_trend.direction, Direction::Unknown);
        assert_eq!(a.summary.overall_trend.confidence, 0);
        assert_eq!(a.periods.last7_days.trend, PeriodTrend::InsufficientData);
    }

    #[test]
    fn test_empty_history() {
        let a = engine().analyze(&[], now());
        assert_eq!(a.summary.total_runs, 0);
        assert!(a.summary.date_range.is_none());
        assert_eq!(a.periods.last90_days.trend, PeriodTrend::NoData);
        assert_eq!(a.healing.target_achievement.percentage_at_target, 0);
        assert!(a.recommendations.is_empty());
    }

    #[test]
    fn test_linear_decline_is_degrading_with_high_confidence() {
        let rates: Vec<f64> = (0..15).map(|i| 95.0 - 2.5 * i as f64).collect();
        let a = engine().analyze(&hourly(&rates), now());
        let t = &a.summary.overall_trend;
        assert_eq!(t.direction, Direction::Degrading);
        assert_eq!(t.slope, -2.5);
        assert_eq!(t.confidence, 100);
        assert_eq!(t.interpretation, "Strong correlation, trend highly reliable");
        assert_eq!(a.periods.last7_days.trend, PeriodTrend::Degrading);
        // Mean of 95..=60 is 77.5: below target, above minimum.
        assert!(a.recommendations.iter().any(|r| r.category == "trend"));
        assert_eq!(a.recommendations[0].priority, Priority::High);
        assert!(a
            .recommendations
            .iter()
            .any(|r| r.category == "success-rate" && r.priority == Priority::Medium));
    }

    #[test]
    fn test_distribution_lower_bounds_are_inclusive() {
        let d = distribution(&[84.999, 85.0, 80.0, 79.99, 70.0, 69.9]);
        assert_eq!(d.excellent.count, 1);
        assert_eq!(d.good.count, 2);
        assert_eq!(d.acceptable.count, 1);
        assert_eq!(d.poor.count, 1);
        assert_eq!(d.critical.count, 1);
        assert_eq!(d.good.percentage, 33);
    }

    #[test]
    fn test_periods_filter_by_timestamp() {
        let mut runs = vec![
            RunRecord::from_rate(now() - Duration::days(60), 70.0),
            RunRecord::from_rate(now() - Duration::days(20), 80.0),
        ];
        runs.extend(hourly(&[90.0, 92.0]));
        let a = engine().analyze(&runs, now());
        assert_eq!(a.periods.last7_days.count, 2);
        assert_eq!(a.periods.last30_days.count, 3);
        assert_eq!(a.periods.last90_days.count, 4);
        assert_eq!(a.periods.last90_days.min, 70.0);
        assert_eq!(a.periods.last90_days.trend, PeriodTrend::Improving);
    }

    #[test]
    fn test_outlier_is_flagged() {
        let mut rates = vec![85.0, 84.0, 86.0, 85.0, 84.0, 86.0, 85.0, 84.0, 86.0, 85.0];
        rates.push(40.0);
        let a = engine().analyze(&hourly(&rates), now());
        assert_eq!(a.patterns.anomalies.len(), 1);
        let anomaly = &a.patterns.anomalies[0];
        assert_eq!(anomaly.success_rate, 40.0);
        assert_eq!(anomaly.kind, AnomalyKind::Negative);
        assert_eq!(anomaly.severity, AnomalySeverity::High);
    }

    #[test]
    fn test_no_anomalies_below_five_runs() {
        let a = engine().analyze(&hourly(&[85.0, 85.0, 85.0, 10.0]), now());
        assert!(a.patterns.anomalies.is_empty());
    }

    #[test]
    fn test_healing_streaks() {
        let rates = [85.0, 90.0, 70.0, 82.0, 83.0, 84.0, 60.0, 81.5];
        let a = engine().analyze(&hourly(&rates), now());
        let h = &a.healing;
        assert_eq!(h.target_achievement.runs_at_target, 6);
        assert_eq!(h.target_achievement.percentage_at_target, 75);
        assert_eq!(h.stability.consecutive_target_runs, 3);
        assert_eq!(h.stability.current_target_streak, 1);
        // 82, 83 sit within 79.1..=83.1.
        assert_eq!(h.stability.longest_stable_streak, 2);
        assert_eq!(h.improvement_from_baseline.min_improvement, 14.0);
    }

    #[test]
    fn test_stable_streak_uses_target_band_only() {
        let rates = hourly(&[85.0, 90.0, 70.0, 82.0, 83.0, 84.0, 60.0, 81.5]);

        // Widening the summary dead zone leaves the streak band alone.
        let mut cfg = AnalysisConfig::default();
        cfg.stable_band = 10.0;
        let a = TrendEngine::new(&cfg).analyze(&rates, now());
        assert_eq!(a.healing.stability.longest_stable_streak, 2);

        // 76.1..=86.1 now also holds 84.
        let mut cfg = AnalysisConfig::default();
        cfg.target_band = 5.0;
        let a = TrendEngine::new(&cfg).analyze(&rates, now());
        assert_eq!(a.healing.stability.longest_stable_streak, 3);
    }

    #[test]
    fn test_weekly_patterns_start_on_sunday() {
        // 2026-05-31 is a Sunday, 2026-05-30 a Saturday.
        let runs = vec![
            RunRecord::from_rate(Utc.with_ymd_and_hms(2026, 5, 30, 9, 0, 0).unwrap(), 80.0),
            RunRecord::from_rate(Utc.with_ymd_and_hms(2026, 5, 31, 9, 0, 0).unwrap(), 90.0),
            RunRecord::from_rate(Utc.with_ymd_and_hms(2026, 5, 31, 21, 0, 0).unwrap(), 70.0),
        ];
        let a = engine().analyze(&runs, now());
        let days: Vec<&str> = a.patterns.weekly_patterns.iter().map(|w| w.day).collect();
        assert_eq!(days, vec!["Sunday", "Saturday"]);
        assert_eq!(a.patterns.weekly_patterns[0].stats.average_rate, 80.0);
        assert_eq!(a.patterns.daily_patterns[&9].count, 2);
        assert_eq!(a.patterns.daily_patterns[&21].max_rate, 70.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let a = engine().analyze(&hourly(&[80.0, 82.0, 84.0]), now());
        let v = serde_json::to_value(&a).unwrap();
        assert!(v["periods"]["last7Days"]["count"].is_number());
        assert_eq!(v["summary"]["overallTrend"]["direction"], "improving");
        assert!(v["patterns"]["successRateDistribution"]["good"].is_object());
        assert_eq!(v["periods"]["last7Days"]["trend"], "improving");
    }
}
