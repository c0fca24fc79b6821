//! Authenticated passthrough endpoints
//!
//! `ANY /v1/proxy/{integration}` and `ANY /v1/proxy/{integration}/{*path}`.
//! The handler translates the axum request into the gateway's forwarding
//! call and reflects the upstream status back to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::{Extension, Json};
use keygate_core::CallerIdentity;
use serde_json::Value;
use tracing::info;

use super::{AppState, DataResponse};
use crate::api::error::ApiError;

/// `ANY /v1/proxy/{integration}`
pub async fn forward_root(
    State(state): State<Arc<AppState>>,
    Path(integration): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Extension(identity): Extension<CallerIdentity>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DataResponse<Value>>), ApiError> {
    forward(state, integration, String::new(), params, identity, method, headers, body).await
}

/// `ANY /v1/proxy/{integration}/{*path}`
pub async fn forward_path(
    State(state): State<Arc<AppState>>,
    Path((integration, path)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Extension(identity): Extension<CallerIdentity>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DataResponse<Value>>), ApiError> {
    forward(state, integration, path, params, identity, method, headers, body).await
}

#[allow(clippy::too_many_arguments)]
async fn forward(
    state: Arc<AppState>,
    integration: String,
    path: String,
    params: HashMap<String, String>,
    identity: CallerIdentity,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DataResponse<Value>>), ApiError> {
    let body = parse_body(&body)?;
    let caller_headers = header_map(&headers);

    info!(
        owner = %identity.owner,
        mode = %identity.mode,
        integration = %integration,
        method = %method,
        path = %path,
        "proxying request"
    );

    let result = state
        .gateway
        .forward(
            &integration,
            &path,
            method.as_str(),
            body,
            &caller_headers,
            &params,
        )
        .await?;

    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::OK);
    Ok((status, Json(DataResponse::new(result.data))))
}

/// A non-empty body must be valid JSON; anything else is the caller's bug.
fn parse_body(body: &Bytes) -> Result<Option<Value>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|_| ApiError::BadRequest("request body must be valid JSON".to_string()))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
