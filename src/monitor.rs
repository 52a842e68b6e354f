//! One monitoring cycle: run every suite, persist the run, write the healing report.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{analyze_failures, FailureAnalysis};
use crate::config::Config;
use crate::report;
use crate::runner::{
    execute_or_placeholder, CommandSuite, PlaywrightResults, RunOutcome, TestRunner,
};
use crate::storage::{append_json_array, success_rate, MetricsStore, RunHistory, RunRecord};

/// Totals across every suite of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overall {
    pub total_tests: u32,
    pub passed_tests: u32,
    pub failed_tests: u32,
    pub success_rate: f64,
    /// Whole seconds summed over the suites.
    pub execution_time: u64,
}

/// Everything one cycle observed, as appended to the daily document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResults {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub suites: BTreeMap<String, RunOutcome>,
    pub overall: Overall,
}

impl MonitorResults {
    pub fn new(timestamp: DateTime<Utc>, outcomes: Vec<RunOutcome>) -> Self {
        let mut suites = BTreeMap::new();
        for outcome in outcomes {
            if suites.contains_key(&outcome.suite) {
                warn!(suite = %outcome.suite, "duplicate suite name, keeping the later result");
            }
            suites.insert(outcome.suite.clone(), outcome);
        }

        let passed: u32 = suites.values().map(|s| s.passed).sum();
        let failed: u32 = suites.values().map(|s| s.failed).sum();
        let overall = Overall {
            total_tests: passed + failed,
            passed_tests: passed,
            failed_tests: failed,
            success_rate: success_rate(passed, failed),
            execution_time: suites.values().map(|s| s.duration_secs).sum(),
        };

        Self {
            timestamp,
            date: timestamp.date_naive(),
            suites,
            overall,
        }
    }

    /// The single data point appended to the run history.
    pub fn record(&self) -> RunRecord {
        let counts = self
            .suites
            .iter()
            .map(|(name, outcome)| (name.clone(), outcome.counts()))
            .collect();
        RunRecord::from_counts(self.timestamp, counts)
    }

    pub fn failures(&self) -> FailureAnalysis {
        analyze_failures(self.suites.values().flat_map(|s| s.failed_tests.iter()))
    }
}

/// Result of [`Monitor::run`].
#[derive(Debug)]
pub struct MonitorRun {
    pub results: MonitorResults,
    pub history: RunHistory,
    pub report: PathBuf,
    pub exit_code: i32,
}

pub struct Monitor {
    cfg: Config,
    runners: Vec<Box<dyn TestRunner>>,
}

impl Monitor {
    pub fn new(cfg: &Config, runners: Vec<Box<dyn TestRunner>>) -> Self {
        Self {
            cfg: cfg.clone(),
            runners,
        }
    }

    /// The browser results reader followed by each configured command suite.
    pub fn from_config(cfg: &Config) -> Self {
        let mut runners: Vec<Box<dyn TestRunner>> =
            vec![Box::new(PlaywrightResults::new(&cfg.runner))];
        runners.extend(
            cfg.runner
                .suites
                .iter()
                .cloned()
                .map(|s| Box::new(CommandSuite::new(s)) as Box<dyn TestRunner>),
        );
        Self::new(cfg, runners)
    }

    /// Run the suites one after another. Never fails: a suite without results
    /// contributes an all-failed placeholder.
    pub async fn collect(&self, now: DateTime<Utc>) -> MonitorResults {
        let mut outcomes = Vec::with_capacity(self.runners.len());
        for runner in &self.runners {
            let outcome = execute_or_placeholder(runner.as_ref()).await;
            info!(
                suite = %outcome.suite,
                passed = outcome.passed,
                failed = outcome.failed,
                status = %outcome.status,
                "suite collected"
            );
            outcomes.push(outcome);
        }
        MonitorResults::new(now, outcomes)
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<MonitorRun> {
        let results = self.collect(now).await;

        let daily = self
            .cfg
            .paths
            .metrics_dir
            .join(format!("{}.json", results.date));
        append_json_array(&daily, &results)
            .with_context(|| format!("failed to append to {}", daily.display()))?;

        let store = MetricsStore::new(self.cfg.paths.cumulative_file());
        let history = store
            .append(results.record(), &self.cfg.analysis)
            .context("failed to update run history")?;

        let body = report::healing::render(&results, &history, &results.failures(), &self.cfg);
        let report = report::write_report(
            &self.cfg.paths.reports_dir,
            &format!("healing-report-{}.md", results.date),
            &body,
        )?;

        let exit_code = if results.overall.success_rate < self.cfg.analysis.minimum {
            1
        } else {
            0
        };
        info!(
            success_rate = results.overall.success_rate,
            total_runs = history.len(),
            report = %report.display(),
            exit_code,
            "monitoring cycle complete"
        );

        Ok(MonitorRun {
            results,
            history,
            report,
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{FailedTest, RunnerError, SuiteStatus};
    use chrono::TimeZone;

    struct Fixed(RunOutcome);

    #[async_trait::async_trait]
    impl TestRunner for Fixed {
        fn suite(&self) -> &str {
            &self.0.suite
        }

        fn expected_tests(&self) -> u32 {
            self.0.total()
        }

        async fn execute(&self) -> Result<RunOutcome, RunnerError> {
            Ok(self.0.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 6, 0, 0).unwrap()
    }

    fn config(dir: &std::path::Path) -> Config {
        let mut cfg = Config::default();
        cfg.paths.metrics_dir = dir.join("metrics");
        cfg.paths.reports_dir = dir.join("reports");
        cfg.paths.alerts_dir = dir.join("alerts");
        cfg
    }

    fn browser(passed: u32, failed: u32) -> Box<dyn TestRunner> {
        let mut outcome = RunOutcome::new("playwright", passed, failed, 140);
        outcome.failed_tests = (0..failed)
            .map(|i| FailedTest {
                title: format!("test {i}"),
                file: "tests/nav.spec.ts".to_string(),
                error: "Timeout 5000ms exceeded".to_string(),
            })
            .collect();
        Box::new(Fixed(outcome))
    }

    #[tokio::test]
    async fn test_results_aggregate_suites() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = Monitor::new(
            &config(dir.path()),
            vec![browser(90, 21), Box::new(Fixed(RunOutcome::new("visual", 15, 0, 30)))],
        );
        let results = monitor.collect(now()).await;

        assert_eq!(results.overall.total_tests, 126);
        assert_eq!(results.overall.passed_tests, 105);
        assert_eq!(results.overall.success_rate, 83.33);
        assert_eq!(results.overall.execution_time, 170);
        assert_eq!(results.record().success_rate, 83.33);
        assert_eq!(results.failures().recurring[0].count, 21);
    }

    #[tokio::test]
    async fn test_run_persists_daily_and_cumulative() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let monitor = Monitor::new(&cfg, vec![browser(90, 21)]);

        monitor.run(now()).await.unwrap();
        let run = monitor.run(now()).await.unwrap();

        assert_eq!(run.exit_code, 0);
        assert_eq!(run.history.len(), 2);
        let daily: Vec<MonitorResults> = serde_json::from_str(
            &std::fs::read_to_string(cfg.paths.metrics_dir.join("2026-05-20.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(daily.len(), 2);
        assert!(run.report.ends_with("healing-report-2026-05-20.md"));
        let report = std::fs::read_to_string(&run.report).unwrap();
        assert!(report.contains("81.08%"));
    }

    #[tokio::test]
    async fn test_missing_results_exit_critical() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let placeholder = RunOutcome::placeholder("playwright", 111, SuiteStatus::Unknown, "missing");
        let run = Monitor::new(&cfg, vec![Box::new(Fixed(placeholder))])
            .run(now())
            .await
            .unwrap();

        assert_eq!(run.results.overall.success_rate, 0.0);
        assert_eq!(run.exit_code, 1);
    }
}
