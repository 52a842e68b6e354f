//! healwatch -- healing-metrics monitor for end-to-end test suites.
//!
//! This crate keeps a bounded success-rate history of test runs and provides
//! the rolling summary, long-run trend analysis, degradation rules and
//! cooldown-gated alert dispatch built on top of it.

pub mod analysis;
pub mod api;
pub mod config;
pub mod detect;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod storage;

use anyhow::{Context, Result};

use crate::config::Config;

/// Serve the dashboard JSON API on `bind`.
pub async fn serve(cfg: &Config, bind: &str) -> Result<()> {
    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))?;
    let app = api::router(api::AppState::new(cfg));

    tracing::info!(%addr, "healwatch dashboard API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
