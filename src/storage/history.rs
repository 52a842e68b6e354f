//! Cumulative run history (`cumulative.json`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::{read_json, write_json, StoreError};
use crate::analysis::stats::round2;
use crate::analysis::summary::Summary;
use crate::config::AnalysisConfig;

/// Percentage of passed tests among executed tests, rounded to two decimals.
/// 0 when nothing ran.
pub fn success_rate(passed: u32, failed: u32) -> f64 {
    let total = passed as u64 + failed as u64;
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * passed as f64 / total as f64)
}

/// Pass/fail counts for one named suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteCounts {
    pub passed: u32,
    pub failed: u32,
}

/// One test-suite execution, reduced to a single success-rate data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub success_rate: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub suites: BTreeMap<String, SuiteCounts>,
}

impl RunRecord {
    /// Build a record whose success rate is derived from the suite counts.
    pub fn from_counts(timestamp: DateTime<Utc>, suites: BTreeMap<String, SuiteCounts>) -> Self {
        let (passed, failed) = totals(&suites);
        Self {
            timestamp,
            date: timestamp.date_naive(),
            success_rate: success_rate(passed, failed),
            suites,
        }
    }

    /// A record carrying only a rate, with no suite breakdown.
    pub fn from_rate(timestamp: DateTime<Utc>, success_rate: f64) -> Self {
        Self {
            timestamp,
            date: timestamp.date_naive(),
            success_rate,
            suites: BTreeMap::new(),
        }
    }

    pub fn passed(&self) -> u32 {
        totals(&self.suites).0
    }

    pub fn failed(&self) -> u32 {
        totals(&self.suites).1
    }

    /// Check the rate is a percentage and, when counts are present, that it is
    /// the one the counts produce.
    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.success_rate.is_finite() || !(0.0..=100.0).contains(&self.success_rate) {
            return Err(StoreError::InvalidRecord(format!(
                "success rate {} at {} is outside [0, 100]",
                self.success_rate, self.timestamp
            )));
        }
        if !self.suites.is_empty() {
            let (passed, failed) = totals(&self.suites);
            let expected = success_rate(passed, failed);
            if (expected - self.success_rate).abs() > 0.005 {
                return Err(StoreError::InvalidRecord(format!(
                    "success rate {} does not match {passed} passed / {failed} failed ({expected})",
                    self.success_rate
                )));
            }
        }
        Ok(())
    }
}

fn totals(suites: &BTreeMap<String, SuiteCounts>) -> (u32, u32) {
    suites.values().fold((0, 0), |(p, f), s| {
        (p.saturating_add(s.passed), f.saturating_add(s.failed))
    })
}

/// Bounded run history plus its derived summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    pub runs: Vec<RunRecord>,
    #[serde(
        default,
        deserialize_with = "empty_object_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<Summary>,
}

/// Older documents store a not-yet-computed summary as `{}`.
fn empty_object_as_none<'de, D>(deserializer: D) -> Result<Option<Summary>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) if map.is_empty() => Ok(None),
        _ => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl RunHistory {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn last(&self) -> Option<&RunRecord> {
        self.runs.last()
    }

    /// Success rates in history order.
    pub fn rates(&self) -> Vec<f64> {
        self.runs.iter().map(|r| r.success_rate).collect()
    }

    /// Validate and append `record`, evict the oldest runs beyond
    /// `cfg.history_limit`, then recompute the summary from scratch.
    pub fn append(&mut self, record: RunRecord, cfg: &AnalysisConfig) -> Result<&Summary, StoreError> {
        record.validate()?;
        self.runs.push(record);

        let limit = cfg.history_limit.max(1);
        if self.runs.len() > limit {
            let excess = self.runs.len() - limit;
            self.runs.drain(..excess);
        }

        let summary = Summary::compute(&self.runs, cfg)
            .ok_or_else(|| StoreError::InvalidRecord("history empty after append".to_string()))?;
        let summary = self.summary.insert(summary);
        Ok(&*summary)
    }

    /// The stored summary, or one computed from the runs if the document had none.
    pub fn summary_or_compute(&self, cfg: &AnalysisConfig) -> Option<Summary> {
        self.summary
            .clone()
            .or_else(|| Summary::compute(&self.runs, cfg))
    }

    fn validate(&self) -> Result<(), StoreError> {
        self.runs.iter().try_for_each(RunRecord::validate)
    }
}

/// File-resident [`RunHistory`].
#[derive(Debug, Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history. Missing → `Unavailable`; unparseable or containing
    /// invalid records → `Corrupt`.
    pub fn load(&self) -> Result<RunHistory, StoreError> {
        let history: RunHistory = read_json(&self.path)?;
        history.validate().map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(history)
    }

    /// Load the history, starting a fresh one if it is missing or corrupt.
    /// A corrupt document is moved aside to `<name>.corrupt` so it is never
    /// merged with, or silently overwritten by, new data.
    pub fn load_or_fresh(&self) -> Result<RunHistory, StoreError> {
        match self.load() {
            Ok(h) => Ok(h),
            Err(StoreError::Unavailable { .. }) => {
                info!(path = %self.path.display(), "no run history yet, starting fresh");
                Ok(RunHistory::default())
            }
            Err(StoreError::Corrupt { reason, .. }) => {
                let aside = self.path.with_extension("json.corrupt");
                warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    %reason,
                    "run history corrupt, starting fresh"
                );
                std::fs::rename(&self.path, &aside).map_err(|e| StoreError::Io {
                    path: aside.clone(),
                    source: e,
                })?;
                Ok(RunHistory::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, history: &RunHistory) -> Result<(), StoreError> {
        write_json(&self.path, history)
    }

    /// Load (or start) the history, append `record`, and persist the whole document.
    pub fn append(&self, record: RunRecord, cfg: &AnalysisConfig) -> Result<RunHistory, StoreError> {
        let mut history = self.load_or_fresh()?;
        history.append(record, cfg)?;
        self.save(&history)?;
        Ok(history)
    }
}
