//! Degradation rules and alert analysis.

pub mod alerting;
pub mod degradation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::alerting::AlertAnalyzer;
pub use self::degradation::{DegradationChecker, DegradationReport};

/// Severity of an alert. Older alert documents spell these `low`, `medium`
/// and `high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "low")]
    Info,
    #[serde(alias = "medium")]
    Warning,
    #[serde(alias = "high")]
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "degradation")]
    Degradation,
    #[serde(rename = "recovery")]
    Recovery,
    #[serde(rename = "consecutive_failures", alias = "consecutive-failures")]
    ConsecutiveFailures,
    #[serde(rename = "volatility")]
    Volatility,
    #[serde(rename = "sharp-drop")]
    SharpDrop,
    #[serde(rename = "trend")]
    Trend,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Critical => "critical",
            AlertKind::Warning => "warning",
            AlertKind::Degradation => "degradation",
            AlertKind::Recovery => "recovery",
            AlertKind::ConsecutiveFailures => "consecutive_failures",
            AlertKind::Volatility => "volatility",
            AlertKind::SharpDrop => "sharp-drop",
            AlertKind::Trend => "trend",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected condition. Computed fresh on every check and never mutated once
/// recorded, apart from the delivery fields stamped by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Channels that accepted the alert.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            title: title.into(),
            message: message.into(),
            details,
            timestamp,
            channels: Vec::new(),
            sent_at: None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
