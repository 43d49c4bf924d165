//! HTTP status endpoints
//!
//! - `GET /health`: liveness plus the last emitted minute
//! - `GET /metrics`: exported service counters
//! - `GET /scores/latest`: most recent score record, 404 before the first

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;
use types::ids::MarketId;

use crate::metrics::ServiceMetrics;
use crate::record::ScoreRecord;

#[derive(Clone)]
pub struct StatusState {
    pub market: MarketId,
    pub metrics: Arc<ServiceMetrics>,
    pub latest: watch::Receiver<Option<ScoreRecord>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub market: String,
    /// Minute start (Unix seconds) of the last scored minute.
    pub last_t: Option<i64>,
}

pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/scores/latest", get(latest_score))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health(State(state): State<StatusState>) -> Json<HealthResponse> {
    let last_t = state.latest.borrow().as_ref().map(|r| r.t);
    Json(HealthResponse {
        status: "ok",
        market: state.market.to_string(),
        last_t,
    })
}

pub async fn metrics(State(state): State<StatusState>) -> Json<BTreeMap<String, u64>> {
    Json(state.metrics.export())
}

pub async fn latest_score(
    State(state): State<StatusState>,
) -> Result<Json<ScoreRecord>, StatusCode> {
    let latest = state.latest.borrow().clone();
    latest.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Serve the status router until `shutdown` flips.
pub async fn serve_status(
    addr: SocketAddr,
    state: StatusState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Status server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}
