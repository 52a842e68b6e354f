//! Cron-driven watch loop. One cycle runs at a time; a fire time that passes
//! while a cycle is still running is skipped, not queued.

use std::future::Future;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule as CronSchedule;
use tracing::{error, info, warn};

/// A parsed watch schedule.
#[derive(Debug, Clone)]
pub struct Watch {
    expr: String,
    schedule: CronSchedule,
}

impl Watch {
    /// Parse a 6- or 7-field expression (seconds first). A classic 5-field
    /// expression is accepted and fires at second 0.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let full = if expr.split_whitespace().count() == 5 {
            format!("0 {expr}")
        } else {
            expr.to_string()
        };
        let schedule = CronSchedule::from_str(&full)
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expr, e))?;
        Ok(Self {
            expr: full,
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }

    /// Fire times in the `hours` after `now`.
    pub fn preview(&self, now: DateTime<Utc>, hours: u64) -> Vec<DateTime<Utc>> {
        let end = now + Duration::hours(i64::try_from(hours).unwrap_or(i64::MAX / 3600));
        self.schedule
            .after(&now)
            .take_while(|t| *t <= end)
            .collect()
    }

    /// Sleep until each fire time and run `cycle`, until Ctrl-C. A failed
    /// cycle is logged and the loop carries on.
    pub async fn run<F, Fut>(&self, mut cycle: F) -> Result<()>
    where
        F: FnMut(DateTime<Utc>) -> Fut,
        Fut: Future<Output = Result<i32>>,
    {
        info!(cron = %self.expr, "watch started");
        loop {
            let now = Utc::now();
            let Some(next) = self.next_after(now) else {
                warn!(cron = %self.expr, "schedule has no further fire times");
                return Ok(());
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next.to_rfc3339(), "waiting for next cycle");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("watch stopped");
                    return Ok(());
                }
            }

            match cycle(Utc::now()).await {
                Ok(code) => info!(exit_code = code, "cycle finished"),
                Err(e) => error!(error = %format!("{e:#}"), "cycle failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_five_field_expression_is_accepted() {
        let watch = Watch::parse("0 */12 * * *").unwrap();
        assert_eq!(watch.expr(), "0 0 */12 * * *");

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 5, 30, 0).unwrap();
        assert_eq!(
            watch.next_after(now),
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_preview_window() {
        let watch = Watch::parse("0 0 */6 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let times = watch.preview(now, 24);
        assert_eq!(times.len(), 4);
        assert_eq!(times[0], Utc.with_ymd_and_hms(2026, 1, 1, 6, 0, 0).unwrap());
        assert_eq!(times[3], Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_expression() {
        assert!(Watch::parse("every tuesday").is_err());
    }
}
