//! User and session endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, DataResponse};
use crate::api::error::ApiError;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenData {
    pub access_key: String,
}

#[derive(Serialize)]
pub struct UserData {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// `POST /v1/auth/users`
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<DataResponse<UserData>>), ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let user = state
        .authenticator
        .create_user(&request.username, &request.password)
        .await?;

    info!(username = %user.username, "user created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(UserData {
            username: user.username,
            created_at: user.created_at,
        })),
    ))
}

/// `POST /v1/auth/token`
///
/// Password login. The returned access key is an ephemeral bearer token;
/// its lifetime is managed by the token store, not the client.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<DataResponse<TokenData>>, ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let access_key = state
        .authenticator
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(DataResponse::new(TokenData { access_key })))
}
