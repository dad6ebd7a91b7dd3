//! Liveness/metrics HTTP surface.
//!
//! A small `AppState` shared via `Arc`, a health handler returning a
//! static JSON body, and a router built once in `build_router` and
//! served with `axum::serve` from `main`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use tower_http::trace::TraceLayer;

/// Shared counters surfaced at `/metrics`. Updated by the heartbeat loop;
/// kept deliberately small — this bridge has no per-message metrics
/// pipeline of its own, so counters stay on plain atomics rather than a
/// dedicated metrics crate.
#[derive(Default)]
pub struct Metrics {
    pub heartbeats_sent: AtomicU64,
}

impl Metrics {
    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

/// GET /health — liveness check.
async fn health() -> Response {
    Json(json!({
        "status": "pass",
        "service": "export",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

/// GET /metrics — Prometheus text exposition format.
async fn metrics(State(state): State<AppState>) -> Response {
    let uptime = state.started_at.elapsed().as_secs();
    let heartbeats = state.metrics.heartbeats_sent.load(Ordering::Relaxed);

    let body = format!(
        "# HELP export_uptime_seconds Seconds since the export service started.\n\
         # TYPE export_uptime_seconds counter\n\
         export_uptime_seconds {uptime}\n\
         # HELP export_heartbeats_sent_total Heartbeats published on the bus.\n\
         # TYPE export_heartbeats_sent_total counter\n\
         export_heartbeats_sent_total {heartbeats}\n"
    );

    ([("content-type", "text/plain; version=0.0.4")], body).into_response()
}

pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
