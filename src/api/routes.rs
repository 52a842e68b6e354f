//! API route definitions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use super::AppState;
use crate::analysis::{health_status, TrendEngine};
use crate::storage::{MetricsStore, RunHistory, StoreError};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .route("/trends", get(trends))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

fn load(state: &AppState) -> Result<RunHistory, StoreError> {
    MetricsStore::new(state.config.paths.cumulative_file()).load()
}

fn error_response(err: StoreError) -> (StatusCode, Json<Value>) {
    match err {
        StoreError::Unavailable { .. } => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No metrics data available" })),
        ),
        other => {
            warn!(error = %other, "failed to load metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load metrics", "detail": other.to_string() })),
            )
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> ApiResult {
    let history = load(&state).map_err(error_response)?;
    let summary = history.summary_or_compute(&state.config.analysis);
    let mut body = serde_json::to_value(&history).map_err(|e| error_response(e.into()))?;
    body["meta"] = json!({
        "lastRefresh": Utc::now().to_rfc3339(),
        "dataPoints": history.len(),
        "healthStatus": health_status(summary.as_ref(), &state.config.analysis),
    });
    Ok(Json(body))
}

async fn status(State(state): State<AppState>) -> ApiResult {
    let history = match load(&state) {
        Ok(h) => h,
        Err(StoreError::Unavailable { .. }) => {
            return Ok(Json(json!({ "status": "no-data", "healthy": false })))
        }
        Err(e) => return Err(error_response(e)),
    };

    let cfg = &state.config.analysis;
    let summary = history.summary_or_compute(cfg);
    Ok(Json(json!({
        "status": health_status(summary.as_ref(), cfg),
        "healthy": summary.as_ref().is_some_and(|s| s.current_success_rate >= cfg.target),
        "timestamp": Utc::now().to_rfc3339(),
        "metrics": {
            "successRate": summary.as_ref().map(|s| s.current_success_rate),
            "averageSuccessRate": summary.as_ref().map(|s| s.average_success_rate),
            "trend": summary.as_ref().map(|s| s.trend),
            "totalRuns": history.len(),
        },
    })))
}

async fn trends(State(state): State<AppState>) -> ApiResult {
    let history = load(&state).map_err(error_response)?;
    let analysis = TrendEngine::new(&state.config.analysis).analyze(&history.runs, Utc::now());
    serde_json::to_value(&analysis)
        .map(Json)
        .map_err(|e| error_response(e.into()))
}
