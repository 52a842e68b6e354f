//! Test-suite runners -- collect pass/fail counts for one monitoring cycle.
//!
//! A runner that cannot produce results is never fatal: the cycle records an
//! all-failed placeholder for that suite and moves on.

pub mod command;
pub mod playwright;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::storage::{success_rate, SuiteCounts};

pub use self::command::CommandSuite;
pub use self::playwright::PlaywrightResults;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` exited with {}", .code.map_or("a signal".to_string(), |c| format!("code {c}")))]
    Exited { command: String, code: Option<i32> },

    #[error("unreadable results {}: {reason}", .path.display())]
    Results { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    Pass,
    Fail,
    /// No results were found for the suite.
    Unknown,
    /// The suite could not be executed or its results could not be read.
    Error,
}

impl SuiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteStatus::Pass => "pass",
            SuiteStatus::Fail => "fail",
            SuiteStatus::Unknown => "unknown",
            SuiteStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SuiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed test as reported by a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTest {
    pub title: String,
    pub file: String,
    pub error: String,
}

/// Result of running one suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub suite: String,
    pub passed: u32,
    pub failed: u32,
    #[serde(default)]
    pub skipped: u32,
    pub duration_secs: u64,
    #[serde(default)]
    pub failed_tests: Vec<FailedTest>,
    pub status: SuiteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RunOutcome {
    pub fn new(suite: &str, passed: u32, failed: u32, duration_secs: u64) -> Self {
        Self {
            suite: suite.to_string(),
            passed,
            failed,
            skipped: 0,
            duration_secs,
            failed_tests: Vec::new(),
            status: if failed == 0 {
                SuiteStatus::Pass
            } else {
                SuiteStatus::Fail
            },
            note: None,
        }
    }

    /// Every expected test counted as failed.
    pub fn placeholder(suite: &str, expected: u32, status: SuiteStatus, note: impl Into<String>) -> Self {
        Self {
            suite: suite.to_string(),
            passed: 0,
            failed: expected,
            skipped: 0,
            duration_secs: 0,
            failed_tests: Vec::new(),
            status,
            note: Some(note.into()),
        }
    }

    pub fn total(&self) -> u32 {
        self.passed.saturating_add(self.failed)
    }

    pub fn success_rate(&self) -> f64 {
        success_rate(self.passed, self.failed)
    }

    pub fn counts(&self) -> SuiteCounts {
        SuiteCounts {
            passed: self.passed,
            failed: self.failed,
        }
    }
}

/// A source of pass/fail counts for one suite.
#[async_trait::async_trait]
pub trait TestRunner: Send + Sync {
    fn suite(&self) -> &str;

    /// Size of the suite, used when no counts can be obtained.
    fn expected_tests(&self) -> u32;

    async fn execute(&self) -> Result<RunOutcome, RunnerError>;
}

/// Run `runner`, replacing any error with an all-failed placeholder.
pub async fn execute_or_placeholder(runner: &dyn TestRunner) -> RunOutcome {
    match runner.execute().await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(suite = runner.suite(), error = %e, "suite produced no results");
            let status = match e {
                RunnerError::Exited { .. } => SuiteStatus::Fail,
                _ => SuiteStatus::Error,
            };
            RunOutcome::placeholder(runner.suite(), runner.expected_tests(), status, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(fn() -> RunnerError);

    #[async_trait::async_trait]
    impl TestRunner for Failing {
        fn suite(&self) -> &str {
            "visual"
        }

        fn expected_tests(&self) -> u32 {
            15
        }

        async fn execute(&self) -> Result<RunOutcome, RunnerError> {
            Err((self.0)())
        }
    }

    #[test]
    fn test_outcome_rate_and_status() {
        let outcome = RunOutcome::new("playwright", 90, 21, 142);
        assert_eq!(outcome.status, SuiteStatus::Fail);
        assert_eq!(outcome.total(), 111);
        assert_eq!(outcome.success_rate(), 81.08);
        assert_eq!(RunOutcome::new("visual", 15, 0, 30).status, SuiteStatus::Pass);
    }

    #[tokio::test]
    async fn test_errors_become_all_failed_placeholders() {
        let timeout = Failing(|| RunnerError::Timeout {
            command: "npm run test:visual".into(),
            secs: 300,
        });
        let outcome = execute_or_placeholder(&timeout).await;
        assert_eq!((outcome.passed, outcome.failed), (0, 15));
        assert_eq!(outcome.status, SuiteStatus::Error);
        assert!(outcome.note.unwrap().contains("timed out after 300s"));

        let exited = Failing(|| RunnerError::Exited {
            command: "npm run test:visual".into(),
            code: Some(1),
        });
        let outcome = execute_or_placeholder(&exited).await;
        assert_eq!(outcome.status, SuiteStatus::Fail);
        assert_eq!(outcome.success_rate(), 0.0);
    }
}
