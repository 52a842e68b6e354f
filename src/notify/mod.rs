//! Alert delivery: cooldown-gated dispatch over a set of channels.
//!
//! A failing channel is logged and skipped; it never stops the other channels
//! or the alert history from being written.

pub mod channels;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::detect::Alert;
use crate::storage::{AlertHistory, AlertLog, StoreError};

pub use self::channels::{ConsoleChannel, FileChannel, WebhookChannel};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {status} after {attempts} attempt(s)")]
    Status { status: u16, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A destination for alerts.
#[async_trait::async_trait]
pub trait AlertChannel: Send + Sync {
    /// Name recorded in the alert history when delivery succeeds.
    fn name(&self) -> &'static str;

    async fn deliver(&self, alert: &Alert) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// An alert of the same type went out within the cooldown window.
    Suppressed,
    /// Recorded in the history; `channels` lists those that accepted it.
    Delivered { channels: Vec<String> },
}

/// Sends alerts through the configured channels and records them in the
/// alert history.
pub struct Dispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
    log: AlertLog,
    history: AlertHistory,
    cooldown: Duration,
    history_limit: usize,
}

impl Dispatcher {
    pub fn new(
        channels: Vec<Box<dyn AlertChannel>>,
        log: AlertLog,
        cooldown: Duration,
        history_limit: usize,
    ) -> Self {
        let history = log.load_or_empty();
        Self {
            channels,
            log,
            history,
            cooldown,
            history_limit,
        }
    }

    /// Build the channel set enabled in `cfg`.
    pub fn from_config(cfg: &Config) -> Result<Self, DispatchError> {
        let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();
        if cfg.channels.console {
            channels.push(Box::new(ConsoleChannel));
        }
        if cfg.channels.file {
            channels.push(Box::new(FileChannel::new(&cfg.paths.alerts_dir)));
        }
        if cfg.channels.webhook {
            if cfg.settings.webhook_url.is_empty() {
                warn!("webhook channel enabled without settings.webhook_url, skipping it");
            } else {
                channels.push(Box::new(WebhookChannel::new(
                    &cfg.settings.webhook_url,
                    std::time::Duration::from_secs(cfg.settings.webhook_timeout_secs),
                    cfg.settings.retry_attempts,
                )?));
            }
        }

        Ok(Self::new(
            channels,
            AlertLog::new(cfg.paths.alert_history_file()),
            cfg.settings.cooldown(),
            cfg.settings.history_limit,
        ))
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    /// Deliver `alert` unless one of the same type is still cooling down.
    /// The history is saved after every delivered alert.
    pub async fn dispatch(
        &mut self,
        mut alert: Alert,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, StoreError> {
        if self.history.is_suppressed(alert.kind, now, self.cooldown) {
            info!(kind = %alert.kind, title = %alert.title, "alert suppressed by cooldown");
            return Ok(DispatchOutcome::Suppressed);
        }

        let mut delivered = Vec::new();
        for channel in &self.channels {
            match channel.deliver(&alert).await {
                Ok(()) => delivered.push(channel.name().to_string()),
                Err(e) => warn!(
                    channel = channel.name(),
                    kind = %alert.kind,
                    error = %e,
                    "alert channel failed"
                ),
            }
        }

        alert.channels = delivered.clone();
        alert.sent_at = Some(now);
        info!(
            kind = %alert.kind,
            severity = %alert.severity,
            channels = ?delivered,
            "alert dispatched"
        );
        self.history.record(alert, self.history_limit);
        self.log.save(&self.history)?;

        Ok(DispatchOutcome::Delivered { channels: delivered })
    }

    pub async fn dispatch_all(
        &mut self,
        alerts: Vec<Alert>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DispatchOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(alerts.len());
        for alert in alerts {
            outcomes.push(self.dispatch(alert, now).await?);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{AlertKind, Severity};
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    struct Recording {
        seen: Arc<Mutex<Vec<AlertKind>>>,
    }

    #[async_trait::async_trait]
    impl AlertChannel for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, alert: &Alert) -> Result<(), DispatchError> {
            self.seen.lock().unwrap().push(alert.kind);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl AlertChannel for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn deliver(&self, _alert: &Alert) -> Result<(), DispatchError> {
            Err(DispatchError::Status {
                status: 503,
                attempts: 3,
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap()
    }

    fn critical(at: DateTime<Utc>) -> Alert {
        Alert::new(
            AlertKind::Critical,
            Severity::Critical,
            "Critical",
            "rate below minimum",
            serde_json::json!({ "current_rate": 70.0 }),
            at,
        )
    }

    fn dispatcher(dir: &std::path::Path, seen: Arc<Mutex<Vec<AlertKind>>>) -> Dispatcher {
        Dispatcher::new(
            vec![Box::new(Broken), Box::new(Recording { seen })],
            AlertLog::new(dir.join("alert-history.json")),
            Duration::minutes(30),
            100,
        )
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_same_type() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = dispatcher(dir.path(), seen.clone());

        let first = d.dispatch(critical(t0()), t0()).await.unwrap();
        assert!(matches!(first, DispatchOutcome::Delivered { .. }));

        let later = t0() + Duration::minutes(10);
        let second = d.dispatch(critical(later), later).await.unwrap();
        assert_eq!(second, DispatchOutcome::Suppressed);
        assert_eq!(d.history().len(), 1);

        let much_later = t0() + Duration::minutes(31);
        let third = d.dispatch(critical(much_later), much_later).await.unwrap();
        assert!(matches!(third, DispatchOutcome::Delivered { .. }));
        assert_eq!(d.history().len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others_or_history() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = dispatcher(dir.path(), seen.clone());

        let outcome = d.dispatch(critical(t0()), t0()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                channels: vec!["recording".to_string()]
            }
        );

        let saved = AlertLog::new(dir.path().join("alert-history.json")).load_or_empty();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.alerts[0].channels, vec!["recording"]);
        assert_eq!(saved.alerts[0].sent_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        dispatcher(dir.path(), seen.clone())
            .dispatch(critical(t0()), t0())
            .await
            .unwrap();

        // A fresh dispatcher loads the saved history and still honours the cooldown.
        let mut d = dispatcher(dir.path(), seen);
        let later = t0() + Duration::minutes(5);
        assert_eq!(
            d.dispatch(critical(later), later).await.unwrap(),
            DispatchOutcome::Suppressed
        );
    }

    #[test]
    fn test_from_config_tolerates_out_of_range_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.paths.alerts_dir = dir.path().to_path_buf();
        cfg.settings.cooldown_minutes = i64::MAX;

        let d = Dispatcher::from_config(&cfg).unwrap();
        assert_eq!(d.cooldown, Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_hung_webhook_fails_only_its_channel() {
        use axum::{http::StatusCode, routing::post, Router};

        let app = Router::new().route(
            "/hook",
            post(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                StatusCode::NO_CONTENT
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let url = format!("http://{addr}/hook");

        let webhook = WebhookChannel::new(&url, std::time::Duration::from_secs(1), 1).unwrap();
        let started = std::time::Instant::now();
        let err = webhook.deliver(&critical(t0())).await.unwrap_err();
        assert!(matches!(err, DispatchError::Http(_)), "got {err:?}");
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = Dispatcher::new(
            vec![
                Box::new(WebhookChannel::new(&url, std::time::Duration::from_secs(1), 1).unwrap()),
                Box::new(Recording { seen: seen.clone() }),
            ],
            AlertLog::new(dir.path().join("alert-history.json")),
            Duration::minutes(30),
            100,
        );
        let outcome = d.dispatch(critical(t0()), t0()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                channels: vec!["recording".to_string()]
            }
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(d.history().alerts[0].channels, vec!["recording"]);
    }
}
