//! Reader for the browser suite's structured results document.
//!
//! The suite itself runs outside healwatch; this runner only reads what it
//! left behind, first `results_file`, then `<report_dir>/data.json`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::{FailedTest, RunOutcome, RunnerError, SuiteStatus, TestRunner};
use crate::config::RunnerConfig;

const SUITE: &str = "playwright";

#[derive(Debug, Default, Deserialize)]
struct ResultsDocument {
    #[serde(default)]
    stats: Stats,
    #[serde(default)]
    tests: Vec<TestEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct Stats {
    #[serde(default, alias = "expected")]
    passed: u32,
    #[serde(default, alias = "unexpected")]
    failed: u32,
    #[serde(default)]
    skipped: u32,
    /// Milliseconds.
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct TestEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    results: Vec<AttemptResult>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    file: String,
}

#[derive(Debug, Deserialize)]
struct AttemptResult {
    #[serde(default)]
    error: Option<AttemptError>,
}

#[derive(Debug, Deserialize)]
struct AttemptError {
    #[serde(default)]
    message: Option<String>,
}

impl TestEntry {
    fn is_failure(&self) -> bool {
        !matches!(self.outcome.as_str(), "expected" | "skipped")
    }

    fn into_failed(self) -> FailedTest {
        let file = self
            .location
            .map(|l| l.file)
            .as_deref()
            .and_then(|f| Path::new(f).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let error = self
            .results
            .into_iter()
            .next()
            .and_then(|r| r.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| "Unknown error".to_string());
        FailedTest {
            title: self.title,
            file,
            error,
        }
    }
}

/// Parse a results document into an outcome for the browser suite.
pub fn parse_results(body: &str) -> Result<RunOutcome, serde_json::Error> {
    let doc: ResultsDocument = serde_json::from_str(body)?;
    let mut outcome = RunOutcome::new(
        SUITE,
        doc.stats.passed,
        doc.stats.failed,
        (doc.stats.duration / 1000.0).round().max(0.0) as u64,
    );
    outcome.skipped = doc.stats.skipped;
    outcome.failed_tests = doc
        .tests
        .into_iter()
        .filter(TestEntry::is_failure)
        .map(TestEntry::into_failed)
        .collect();
    Ok(outcome)
}

/// Reads the browser suite's last results.
#[derive(Debug, Clone)]
pub struct PlaywrightResults {
    results_file: PathBuf,
    report_dir: PathBuf,
    expected: u32,
}

impl PlaywrightResults {
    pub fn new(cfg: &RunnerConfig) -> Self {
        Self {
            results_file: cfg.results_file.clone(),
            report_dir: cfg.report_dir.clone(),
            expected: cfg.expected_tests,
        }
    }

    fn read(path: &Path) -> Result<RunOutcome, RunnerError> {
        let body = std::fs::read_to_string(path).map_err(|e| RunnerError::Results {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        parse_results(&body).map_err(|e| RunnerError::Results {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TestRunner for PlaywrightResults {
    fn suite(&self) -> &str {
        SUITE
    }

    fn expected_tests(&self) -> u32 {
        self.expected
    }

    async fn execute(&self) -> Result<RunOutcome, RunnerError> {
        if self.results_file.exists() {
            debug!(path = %self.results_file.display(), "reading browser results");
            return Self::read(&self.results_file);
        }

        let report = self.report_dir.join("data.json");
        if report.exists() {
            debug!(path = %report.display(), "reading browser report data");
            return Ok(Self::read(&report).unwrap_or_else(|e| {
                RunOutcome::placeholder(SUITE, self.expected, SuiteStatus::Unknown, e.to_string())
            }));
        }

        info!(
            results = %self.results_file.display(),
            report = %report.display(),
            "no browser results found"
        );
        Ok(RunOutcome::placeholder(
            SUITE,
            self.expected,
            SuiteStatus::Unknown,
            "Results not available - tests may not have run",
        ))
    }
}
