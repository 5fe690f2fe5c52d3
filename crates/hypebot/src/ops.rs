//! Ops HTTP surface.
//!
//! - `GET  /api/health`
//! - `GET  /metrics` (Prometheus text)
//! - `GET  /api/running`
//! - `POST /api/bots/{id}/execute`
//! - `POST /api/cron/execute-bots`

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hypebot_core::BotId;
use hypebot_engine::{BotService, ExecutionStatus};
use hypebot_telemetry::encode_metrics;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::AppResult;

#[derive(Clone)]
pub struct OpsState {
    service: BotService,
}

impl OpsState {
    pub fn new(service: BotService) -> Self {
        Self { service }
    }
}

pub fn router(state: OpsState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/running", get(running_bots))
        .route("/api/bots/{id}/execute", post(execute_bot))
        .route("/api/cron/execute-bots", post(execute_all))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: OpsState,
    shutdown: CancellationToken,
) -> AppResult<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Ops server stopped");
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn metrics() -> AppResult<Response> {
    let body = encode_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn running_bots(State(state): State<OpsState>) -> Json<Value> {
    let scheduler = state.service.scheduler();
    Json(json!({
        "running": scheduler.running_bots(),
        "retrying": scheduler.pending_retries(),
    }))
}

async fn execute_bot(
    State(state): State<OpsState>,
    Path(id): Path<String>,
) -> AppResult<Json<ExecutionStatus>> {
    let id: BotId = id.parse()?;
    // 404 before touching the exchange.
    state.service.get(id).await?;
    Ok(Json(state.service.scheduler().execute_bot(id).await))
}

async fn execute_all(State(state): State<OpsState>) -> AppResult<Json<Value>> {
    let summary = state.service.scheduler().execute_all().await?;
    let message = if summary.bots == 0 {
        "No bots".to_string()
    } else {
        format!("Executed {} bots", summary.bots)
    };
    Ok(Json(json!({
        "message": message,
        "executed": summary.bots,
        "summary": summary,
    })))
}
