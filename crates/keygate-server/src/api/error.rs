//! HTTP error responses
//!
//! Every failure leaves the server as the same JSON envelope:
//! `{"success": false, "message": ..., "error": {...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keygate_auth::AuthError;
use keygate_core::GatewayError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Gateway(GatewayError),
}

/// The uniform failure envelope
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    error: Value,
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            // One source for the uniform rejection wording
            AuthError::Unauthenticated => {
                ApiError::Unauthorized(GatewayError::unauthenticated().message)
            }
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("invalid username or password".to_string())
            }
            AuthError::OwnerNotFound(owner) => {
                ApiError::NotFound(format!("user not found: {}", owner))
            }
            AuthError::UserExists(username) => {
                ApiError::Conflict(format!("user already exists: {}", username))
            }
            AuthError::Persistence(detail) | AuthError::Backend(detail) => {
                ApiError::Internal(detail)
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError::Gateway(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, Value::Null),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message, Value::Null),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, Value::Null),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, Value::Null),
            ApiError::Internal(detail) => {
                // Internal detail goes to the log, never to the caller.
                error!(detail = %detail, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    Value::Null,
                )
            }
            ApiError::Gateway(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let detail = e.details.clone().unwrap_or(Value::Null);
                (status, e.message, detail)
            }
        };

        let error = match detail {
            Value::Null => json!({ "message": message }),
            detail => detail,
        };

        let body = ErrorBody {
            success: false,
            message,
            error,
        };
        (status, Json(body)).into_response()
    }
}
