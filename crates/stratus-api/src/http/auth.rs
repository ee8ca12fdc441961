//! Bearer-token admin authorization middleware.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Reject the request unless it carries a valid cluster-admin bearer token.
pub async fn require_admin_token(
    State(state): State<Arc<ApiState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req);
    state
        .gate
        .validate_token(token.as_deref())
        .map_err(|err| ApiError::unauthorized(err.to_string()))?;
    Ok(next.run(req).await)
}

/// Extract the bearer token from the `Authorization` header, if present.
pub(crate) fn bearer_token(req: &Request<axum::body::Body>) -> Option<String> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
