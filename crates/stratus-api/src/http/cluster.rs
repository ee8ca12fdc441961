//! Cluster-internal endpoints: delta ingest, heartbeats, joins, and the
//! snapshot pull used by peer reconciliation. Peers authenticate with the
//! cluster admin secret like any other administrative caller.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};

use stratus_config::{Config, ConfigDelta};
use stratus_sync::{HeartbeatPing, JoinRequest, NodeIdentity};

use crate::http::errors::ApiError;
use crate::models::ResultResponse;
use crate::state::ApiState;

/// `POST /v1/cluster/config`
pub async fn ingest_delta(
    State(state): State<Arc<ApiState>>,
    Json(delta): Json<ConfigDelta>,
) -> Result<Json<Value>, ApiError> {
    state.sync.apply_delta(delta).await?;
    Ok(Json(json!({})))
}

/// `POST /v1/cluster/heartbeat`
pub async fn heartbeat(
    State(state): State<Arc<ApiState>>,
    Json(ping): Json<HeartbeatPing>,
) -> Json<Value> {
    state.sync.handle_heartbeat(&ping);
    Json(json!({}))
}

/// `POST /v1/cluster/join`
pub async fn join(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<JoinRequest>,
) -> Json<ResultResponse<NodeIdentity>> {
    let identity = state.sync.handle_join(&request);
    Json(ResultResponse { result: identity })
}

/// `GET /v1/cluster/snapshot`
pub async fn snapshot(State(state): State<Arc<ApiState>>) -> Json<ResultResponse<Config>> {
    let (config, _) = state.sync.local_snapshot().await;
    Json(ResultResponse {
        result: (*config).clone(),
    })
}
