//! API key management endpoints
//!
//! All routes run behind the auth middleware; the owner is always the
//! authenticated caller, never a request field.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use keygate_auth::mask_key;
use keygate_core::CallerIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AppState, DataResponse};
use crate::api::error::ApiError;

#[derive(Deserialize, Default)]
pub struct IssueKeyRequest {
    pub name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The one response that carries the full key value
#[derive(Serialize)]
pub struct IssuedKey {
    pub id: String,
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Listing entry: the key value is masked
#[derive(Serialize)]
pub struct KeySummary {
    pub id: String,
    pub key: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// `POST /v1/keys`
pub async fn issue_key(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Json(request): Json<IssueKeyRequest>,
) -> Result<(StatusCode, Json<DataResponse<IssuedKey>>), ApiError> {
    if let Some(expires_at) = request.expires_at {
        if expires_at <= Utc::now() {
            return Err(ApiError::BadRequest(
                "expires_at must be in the future".to_string(),
            ));
        }
    }

    let record = state
        .keys
        .issue(&identity.owner, request.name, request.expires_at)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(IssuedKey {
            id: record.id,
            key: record.key,
            name: record.name,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })),
    ))
}

/// `GET /v1/keys`
pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<Json<DataResponse<Vec<KeySummary>>>, ApiError> {
    let records = state.keys.list_for_owner(&identity.owner).await?;

    let summaries = records
        .into_iter()
        .map(|record| KeySummary {
            id: record.id,
            key: mask_key(&record.key),
            name: record.name,
            is_active: record.is_active,
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
        })
        .collect();

    Ok(Json(DataResponse::new(summaries)))
}

/// `DELETE /v1/keys/{id}`
pub async fn revoke_key(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Value>>, ApiError> {
    let revoked = state.keys.revoke(&identity.owner, &id).await?;
    if !revoked {
        return Err(ApiError::NotFound(format!("API key not found: {}", id)));
    }

    Ok(Json(DataResponse::new(json!({ "id": id, "revoked": true }))))
}

/// `PATCH /v1/keys/{id}`
pub async fn set_key_active(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<DataResponse<Value>>, ApiError> {
    let updated = state
        .keys
        .set_active(&identity.owner, &id, request.is_active)
        .await?;
    if !updated {
        return Err(ApiError::NotFound(format!("API key not found: {}", id)));
    }

    Ok(Json(DataResponse::new(json!({
        "id": id,
        "is_active": request.is_active,
    }))))
}
