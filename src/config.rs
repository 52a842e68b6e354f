//! TOML configuration for healwatch.
//!
//! Every section carries `#[serde(default)]`, so a user file only needs the keys
//! it wants to override. The merged [`Config`] is built once at start-up and
//! passed by reference into each engine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "HEALWATCH_CONFIG";

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "healwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub settings: AlertSettings,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.settings.sanitize();
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the config path: explicit argument, then `HEALWATCH_CONFIG`, then
    /// `healwatch.toml` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        match std::env::var(CONFIG_ENV) {
            Ok(env_path) if !env_path.is_empty() => PathBuf::from(env_path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load the file at `path`, writing the defaults there first if it does not
    /// exist. A file that exists but cannot be parsed falls back to defaults
    /// without being overwritten.
    pub fn load_or_init(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => info!(path = %path.display(), "default configuration created"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "could not write default configuration"
                ),
            }
            return config;
        }

        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "config file could not be loaded, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Write this configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        debug!(path = %path.display(), "configuration written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Locations of the persisted documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `cumulative.json` and the daily run documents.
    pub metrics_dir: PathBuf,
    /// Directory receiving Markdown reports and error logs.
    pub reports_dir: PathBuf,
    /// Directory holding `alert-history.json`, daily alert files and `alerts.log`.
    pub alerts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            metrics_dir: PathBuf::from("healing-metrics"),
            reports_dir: PathBuf::from("healing-reports"),
            alerts_dir: PathBuf::from("healing-alerts"),
        }
    }
}

impl PathsConfig {
    pub fn cumulative_file(&self) -> PathBuf {
        self.metrics_dir.join("cumulative.json")
    }

    pub fn alert_history_file(&self) -> PathBuf {
        self.alerts_dir.join("alert-history.json")
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Alerting thresholds, in success-rate percentage points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this the current rate is critical.
    pub critical: f64,
    /// Below this the current rate is a warning (the healing target).
    pub warning: f64,
    /// Recent-minus-previous mean at or below this raises a degradation alert.
    pub degradation: f64,
    /// Trailing runs below `warning` needed for a consecutive-failure alert.
    pub consecutive_failures: usize,
    /// Trailing runs below `warning` that escalate that alert to critical.
    pub consecutive_critical: usize,
    /// Standard deviation above which results are considered volatile.
    pub volatility: f64,
    /// Drop in points between adjacent windows that counts as sharp.
    pub sharp_drop: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical: 75.0,
            warning: 81.1,
            degradation: -5.0,
            consecutive_failures: 3,
            consecutive_critical: 5,
            volatility: 8.0,
            sharp_drop: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Window sizes and reference rates used by the analysis engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum runs kept in the cumulative history.
    pub history_limit: usize,
    /// Runs averaged into `Summary.averageSuccessRate`.
    pub summary_window: usize,
    /// Size of each of the two windows compared for the summary trend.
    pub trend_window: usize,
    /// Runs used for "current volatility".
    pub volatility_window: usize,
    /// Healing target success rate.
    pub target: f64,
    /// Minimum acceptable success rate.
    pub minimum: f64,
    /// Success rate before healing was introduced.
    pub healing_baseline: f64,
    /// Dead zone for the summary trend: smaller window-to-window changes are stable.
    pub stable_band: f64,
    /// Half-width of the band around `target` counted as a stable streak.
    pub target_band: f64,
    /// Standard deviations from the mean that flag an anomaly.
    pub anomaly_sigma: f64,
    /// Standard deviations from the mean that make an anomaly high severity.
    pub anomaly_high_sigma: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            summary_window: 10,
            trend_window: 5,
            volatility_window: 10,
            target: 81.1,
            minimum: 75.0,
            healing_baseline: 46.0,
            stable_band: 2.0,
            target_band: 2.0,
            anomaly_sigma: 2.0,
            anomaly_high_sigma: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Channels & settings
// ---------------------------------------------------------------------------

/// Which alert channels are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub console: bool,
    pub file: bool,
    pub webhook: bool,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            console: true,
            file: true,
            webhook: false,
        }
    }
}

/// Dispatch behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub webhook_url: String,
    pub webhook_timeout_secs: u64,
    /// Minimum minutes between two dispatched alerts of the same type.
    pub cooldown_minutes: i64,
    /// How far back a critical/warning alert makes a recovery alert eligible.
    pub recovery_window_hours: i64,
    pub retry_attempts: u32,
    /// Maximum alerts kept in the alert history.
    pub history_limit: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            webhook_timeout_secs: 10,
            cooldown_minutes: 30,
            recovery_window_hours: 24,
            retry_attempts: 3,
            history_limit: 100,
        }
    }
}

/// Longest accepted cooldown or recovery window, in minutes (one year).
const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

impl AlertSettings {
    /// Reset window settings that are negative or beyond a year to their
    /// defaults, logging each one.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !(0..=MAX_WINDOW_MINUTES).contains(&self.cooldown_minutes) {
            warn!(
                value = self.cooldown_minutes,
                default = defaults.cooldown_minutes,
                "settings.cooldown_minutes out of range, using default"
            );
            self.cooldown_minutes = defaults.cooldown_minutes;
        }
        if !(0..=MAX_WINDOW_MINUTES / 60).contains(&self.recovery_window_hours) {
            warn!(
                value = self.recovery_window_hours,
                default = defaults.recovery_window_hours,
                "settings.recovery_window_hours out of range, using default"
            );
            self.recovery_window_hours = defaults.recovery_window_hours;
        }
    }

    /// Per-type alert cooldown. Out-of-range values fall back to the default.
    pub fn cooldown(&self) -> Duration {
        let minutes = if (0..=MAX_WINDOW_MINUTES).contains(&self.cooldown_minutes) {
            self.cooldown_minutes
        } else {
            Self::default().cooldown_minutes
        };
        Duration::minutes(minutes)
    }

    /// Window in which a critical/warning alert makes recovery eligible.
    pub fn recovery_window(&self) -> Duration {
        let hours = if (0..=MAX_WINDOW_MINUTES / 60).contains(&self.recovery_window_hours) {
            self.recovery_window_hours
        } else {
            Self::default().recovery_window_hours
        };
        Duration::hours(hours)
    }
}

/// Toggles for optional alert families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub on_recovery: bool,
    pub on_degradation: bool,
    pub on_critical: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            on_recovery: true,
            on_degradation: true,
            on_critical: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Test suites executed by `healwatch monitor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Structured results document written by the browser test runner.
    pub results_file: PathBuf,
    /// Report directory searched for `data.json` when `results_file` is missing.
    pub report_dir: PathBuf,
    /// Size of the browser suite, used for the all-failed placeholder.
    pub expected_tests: u32,
    /// Optional command-driven suites, run in order.
    pub suites: Vec<CommandSuiteConfig>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            results_file: PathBuf::from("test-results/.last-run.json"),
            report_dir: PathBuf::from("playwright-report"),
            expected_tests: 111,
            suites: vec![CommandSuiteConfig::default()],
        }
    }
}

/// A suite executed as a blocking subprocess with a hard timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSuiteConfig {
    pub name: String,
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub expected_tests: u32,
}

impl Default for CommandSuiteConfig {
    fn default() -> Self {
        Self {
            name: "visual".to_string(),
            command: vec!["npm".into(), "run".into(), "test:visual".into()],
            timeout_secs: 300,
            expected_tests: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Dashboard API listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8081".to_string(),
        }
    }
}
