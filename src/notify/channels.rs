//! Console, file and webhook alert channels.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{AlertChannel, DispatchError};
use crate::detect::{Alert, AlertKind, Severity};
use crate::storage::{append_json_array, append_line};

/// Source name sent with webhook payloads.
const WEBHOOK_SOURCE: &str = "healwatch";

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Prints alerts to stdout with ANSI colour.
pub struct ConsoleChannel;

impl ConsoleChannel {
    fn style(kind: AlertKind) -> (&'static str, &'static str) {
        match kind {
            AlertKind::Critical | AlertKind::ConsecutiveFailures | AlertKind::SharpDrop => {
                ("\x1b[31m", "[!!]")
            }
            AlertKind::Warning | AlertKind::Volatility | AlertKind::Trend => ("\x1b[33m", "[!]"),
            AlertKind::Degradation => ("\x1b[35m", "[v]"),
            AlertKind::Recovery => ("\x1b[32m", "[ok]"),
        }
    }
}

#[async_trait::async_trait]
impl AlertChannel for ConsoleChannel {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), DispatchError> {
        const RESET: &str = "\x1b[0m";
        let (color, icon) = Self::style(alert.kind);
        println!();
        println!("{color}{icon} {}{RESET}", alert.title);
        println!("{color}{}{RESET}", alert.message);
        if !alert.details.is_null() {
            let details = serde_json::to_string_pretty(&alert.details).unwrap_or_default();
            println!("{color}Details: {details}{RESET}");
        }
        println!("{color}Timestamp: {}{RESET}", alert.timestamp.to_rfc3339());
        println!();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Appends alerts to `alert-<date>.json` and one line each to `alerts.log`.
pub struct FileChannel {
    dir: PathBuf,
}

impl FileChannel {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn daily_file(&self, alert: &Alert) -> PathBuf {
        self.dir
            .join(format!("alert-{}.json", alert.timestamp.format("%Y-%m-%d")))
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.join("alerts.log")
    }
}

#[async_trait::async_trait]
impl AlertChannel for FileChannel {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), DispatchError> {
        let daily = self.daily_file(alert);
        append_json_array(&daily, alert)?;
        append_line(
            &self.log_file(),
            &format!(
                "[{}] {}: {} - {}",
                alert.timestamp.to_rfc3339(),
                alert.severity.as_str().to_uppercase(),
                alert.title,
                alert.message
            ),
        )?;
        debug!(path = %daily.display(), "alert written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    alert_type: AlertKind,
    severity: Severity,
    title: &'a str,
    message: &'a str,
    details: &'a serde_json::Value,
    timestamp: String,
    source: &'static str,
}

/// POSTs alerts as JSON, retrying failed attempts with a short linear backoff.
pub struct WebhookChannel {
    client: Client,
    url: String,
    attempts: u32,
}

impl WebhookChannel {
    pub fn new(url: &str, timeout: Duration, attempts: u32) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            attempts: attempts.max(1),
        })
    }
}

#[async_trait::async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), DispatchError> {
        let payload = WebhookPayload {
            alert_type: alert.kind,
            severity: alert.severity,
            title: &alert.title,
            message: &alert.message,
            details: &alert.details,
            timestamp: alert.timestamp.to_rfc3339(),
            source: WEBHOOK_SOURCE,
        };

        let mut last_err = None;
        for attempt in 1..=self.attempts {
            match self.client.post(&self.url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    last_err = Some(DispatchError::Status {
                        status: resp.status().as_u16(),
                        attempts: attempt,
                    })
                }
                Err(e) => last_err = Some(DispatchError::Http(e)),
            }
            if attempt < self.attempts {
                warn!(attempt, url = %self.url, "webhook delivery failed, retrying");
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
        }

        Err(last_err.unwrap_or(DispatchError::Status {
            status: 0,
            attempts: self.attempts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    fn alert() -> Alert {
        Alert::new(
            AlertKind::SharpDrop,
            Severity::Critical,
            "Sharp Success Rate Drop",
            "Detected significant drop",
            serde_json::json!({ "drop": 18.0 }),
            Utc.with_ymd_and_hms(2026, 9, 1, 7, 15, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_file_channel_appends() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::new(dir.path());

        channel.deliver(&alert()).await.unwrap();
        channel.deliver(&alert()).await.unwrap();

        let daily = dir.path().join("alert-2026-09-01.json");
        let saved: Vec<Alert> =
            serde_json::from_str(&std::fs::read_to_string(daily).unwrap()).unwrap();
        assert_eq!(saved.len(), 2);

        let log = std::fs::read_to_string(channel.log_file()).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.starts_with("[2026-09-01T07:15:00+00:00] CRITICAL: Sharp Success Rate Drop"));
    }

    #[tokio::test]
    async fn test_webhook_posts_payload() {
        let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(seen): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                     Json(body): Json<serde_json::Value>| async move {
                        seen.lock().unwrap().push(body);
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let channel =
            WebhookChannel::new(&format!("http://{addr}/hook"), Duration::from_secs(5), 3).unwrap();
        channel.deliver(&alert()).await.unwrap();

        let seen = received.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["alert_type"], "sharp-drop");
        assert_eq!(seen[0]["severity"], "critical");
        assert_eq!(seen[0]["source"], "healwatch");
        assert_eq!(seen[0]["details"]["drop"], 18.0);
    }

    #[tokio::test]
    async fn test_webhook_error_status_fails_after_retries() {
        let hits: Arc<Mutex<u32>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(|State(hits): State<Arc<Mutex<u32>>>| async move {
                    *hits.lock().unwrap() += 1;
                    StatusCode::BAD_GATEWAY
                }),
            )
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let channel =
            WebhookChannel::new(&format!("http://{addr}/hook"), Duration::from_secs(5), 2).unwrap();
        let err = channel.deliver(&alert()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Status { status: 502, attempts: 2 }));
        assert_eq!(*hits.lock().unwrap(), 2);
    }
}
