//! HTTP endpoint: Prometheus exposition and worker health.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use poller::{HealthRegistry, RepositoryHealth};
use prometheus::{Encoder, Registry, TextEncoder};
use runs::RepositoryName;
use tracing::error;

#[derive(Clone)]
struct AppState {
    registry: Registry,
    health: HealthRegistry,
}

pub fn router(registry: Registry, health: HealthRegistry) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health_report))
        .with_state(AppState { registry, health })
}

async fn metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.registry.gather(), &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn health_report(
    State(state): State<AppState>,
) -> Json<BTreeMap<RepositoryName, RepositoryHealth>> {
    Json(state.health.snapshot())
}
