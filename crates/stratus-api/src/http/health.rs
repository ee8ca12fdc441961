//! Public health and metrics probes.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::{Value, json};

use crate::state::ApiState;

/// `GET /health`
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let (_, version) = state.sync.local_snapshot().await;
    Json(json!({
        "status": "ok",
        "node_id": state.sync.node_id(),
        "config_version": version,
        "cluster_members": state.sync.registry().members().len(),
    }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to render metrics: {err}"),
        ),
    }
}
