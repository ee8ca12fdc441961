//! Administrative file-store endpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::error;

use stratus_config::{FileRule, FileStoreConfig};

use crate::http::errors::ApiError;
use crate::models::{ResultResponse, StateResponse};
use crate::state::ApiState;

/// Budget for administrative writes.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for privileged reads.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// `POST /{project}/file-store/config`
pub async fn set_file_store(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
    Json(value): Json<FileStoreConfig>,
) -> Result<Json<Value>, ApiError> {
    timeout(WRITE_TIMEOUT, state.sync.set_file_store(&project_id, value))
        .await
        .map_err(|_| ApiError::timed_out())??;
    Ok(Json(json!({})))
}

/// `GET /{project}/file-store/config`
pub async fn get_file_store(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> Result<Json<ResultResponse<FileStoreConfig>>, ApiError> {
    let config = timeout(READ_TIMEOUT, state.sync.get_file_store_config(&project_id))
        .await
        .map_err(|_| ApiError::timed_out())??;
    Ok(Json(ResultResponse { result: config }))
}

/// `GET /{project}/file-store/state`
///
/// Probe failures are reported in the body with a 200, not as an HTTP
/// failure; only auth errors surface as failures here.
pub async fn get_file_state(
    State(state): State<Arc<ApiState>>,
    Path(_project_id): Path<String>,
) -> Result<Json<StateResponse>, ApiError> {
    match timeout(READ_TIMEOUT, state.filestore.get_state()).await {
        Ok(Ok(())) => Ok(Json(StateResponse {
            result: true,
            error: None,
        })),
        Ok(Err(err)) => {
            error!(error = %err, "file store state probe failed");
            Ok(Json(StateResponse {
                result: false,
                error: Some(err.to_string()),
            }))
        }
        Err(_) => Ok(Json(StateResponse {
            result: false,
            error: Some("state probe timed out".to_string()),
        })),
    }
}

/// `POST|PUT /{project}/file-store/rule/{id}`
pub async fn set_file_rule(
    State(state): State<Arc<ApiState>>,
    Path((project_id, rule_id)): Path<(String, String)>,
    Json(value): Json<FileRule>,
) -> Result<Json<Value>, ApiError> {
    timeout(
        WRITE_TIMEOUT,
        state.sync.set_file_rule(&project_id, &rule_id, value),
    )
    .await
    .map_err(|_| ApiError::timed_out())??;
    Ok(Json(json!({})))
}

/// `GET /{project}/file-store/rule?id=`
///
/// An omitted or empty `id` returns every rule for the project.
pub async fn get_file_rules(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ResultResponse<Vec<FileRule>>>, ApiError> {
    let filter = params.get("id").map(String::as_str).unwrap_or_default();
    let rules = timeout(
        READ_TIMEOUT,
        state.sync.get_file_store_rules(&project_id, filter),
    )
    .await
    .map_err(|_| ApiError::timed_out())??;
    Ok(Json(ResultResponse { result: rules }))
}

/// `DELETE /{project}/file-store/rule/{id}`
///
/// Any request body is ignored; deleting an absent rule succeeds.
pub async fn delete_file_rule(
    State(state): State<Arc<ApiState>>,
    Path((project_id, rule_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    timeout(
        WRITE_TIMEOUT,
        state.sync.set_delete_file_rule(&project_id, &rule_id),
    )
    .await
    .map_err(|_| ApiError::timed_out())??;
    Ok(Json(json!({})))
}
