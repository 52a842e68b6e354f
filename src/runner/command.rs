//! Command-driven suites: spawn, wait with a hard timeout, count results.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use super::{RunOutcome, RunnerError, TestRunner};
use crate::config::CommandSuiteConfig;

static PASSED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+) passed").ok());
static FAILED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+) failed").ok());

/// Last `<n> passed` / `<n> failed` counts printed by the command, if any.
fn summary_counts(output: &str) -> Option<(u32, u32)> {
    let last = |re: &Lazy<Option<Regex>>| -> Option<u32> {
        re.as_ref()?
            .captures_iter(output)
            .last()
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };
    match (last(&PASSED), last(&FAILED)) {
        (None, None) => None,
        (passed, failed) => Some((passed.unwrap_or(0), failed.unwrap_or(0))),
    }
}

/// Runs a configured command as one suite.
#[derive(Debug, Clone)]
pub struct CommandSuite {
    cfg: CommandSuiteConfig,
}

impl CommandSuite {
    pub fn new(cfg: CommandSuiteConfig) -> Self {
        Self { cfg }
    }

    fn display(&self) -> String {
        self.cfg.command.join(" ")
    }
}

#[async_trait::async_trait]
impl TestRunner for CommandSuite {
    fn suite(&self) -> &str {
        &self.cfg.name
    }

    fn expected_tests(&self) -> u32 {
        self.cfg.expected_tests
    }

    async fn execute(&self) -> Result<RunOutcome, RunnerError> {
        let command = self.display();
        let Some((program, args)) = self.cfg.command.split_first() else {
            return Err(RunnerError::Spawn {
                command,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        info!(suite = %self.cfg.name, %command, "running suite");
        let started = Instant::now();
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(Duration::from_secs(self.cfg.timeout_secs), child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(RunnerError::Spawn { command, source }),
            Err(_) => {
                return Err(RunnerError::Timeout {
                    command,
                    secs: self.cfg.timeout_secs,
                })
            }
        };
        let elapsed = started.elapsed().as_secs();

        let text = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let counts = summary_counts(&text);
        debug!(suite = %self.cfg.name, status = ?output.status, ?counts, "suite finished");

        match (output.status.success(), counts) {
            (_, Some((passed, failed))) => Ok(RunOutcome::new(&self.cfg.name, passed, failed, elapsed)),
            (true, None) => Ok(RunOutcome::new(&self.cfg.name, self.cfg.expected_tests, 0, elapsed)),
            (false, None) => Err(RunnerError::Exited {
                command,
                code: output.status.code(),
            }),
        }
    }
}
