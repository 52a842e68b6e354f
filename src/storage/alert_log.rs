//! Alert history (`alert-history.json`), used for cooldown suppression and
//! "last alert of type X" lookups.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{read_json, write_json, StoreError};
use crate::detect::{Alert, AlertKind};

/// Dispatched alerts, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertHistory {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl AlertHistory {
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Most recent alert whose type is one of `kinds`.
    pub fn last_of(&self, kinds: &[AlertKind]) -> Option<&Alert> {
        self.alerts.iter().rev().find(|a| kinds.contains(&a.kind))
    }

    /// True if an alert of `kind` was recorded within `cooldown` before `now`.
    /// Each alert type has its own window.
    pub fn is_suppressed(&self, kind: AlertKind, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let cutoff = now - cooldown;
        self.alerts
            .iter()
            .any(|a| a.kind == kind && a.timestamp > cutoff)
    }

    /// Alerts timestamped after `cutoff`.
    pub fn since(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(move |a| a.timestamp > cutoff)
    }

    /// Append `alert`, keeping only the most recent `limit` entries.
    pub fn record(&mut self, alert: Alert, limit: usize) {
        self.alerts.push(alert);
        let limit = limit.max(1);
        if self.alerts.len() > limit {
            let excess = self.alerts.len() - limit;
            self.alerts.drain(..excess);
        }
    }
}

/// File-resident [`AlertHistory`].
#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history; missing or unreadable documents yield an empty one.
    pub fn load_or_empty(&self) -> AlertHistory {
        match read_json(&self.path) {
            Ok(h) => h,
            Err(StoreError::Unavailable { .. }) => AlertHistory::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "alert history unreadable, starting fresh");
                AlertHistory::default()
            }
        }
    }

    pub fn save(&self, history: &AlertHistory) -> Result<(), StoreError> {
        write_json(&self.path, history)
    }
}
