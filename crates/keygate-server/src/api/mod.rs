//! HTTP API surface

pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the full application router
///
/// Auth and health routes are open; key management and proxy routes sit
/// behind the authentication middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route(
            "/v1/keys",
            post(handlers::apikey::issue_key).get(handlers::apikey::list_keys),
        )
        .route(
            "/v1/keys/{id}",
            delete(handlers::apikey::revoke_key).patch(handlers::apikey::set_key_active),
        )
        .route("/v1/proxy/{integration}", any(handlers::proxy::forward_root))
        .route(
            "/v1/proxy/{integration}/{*path}",
            any(handlers::proxy::forward_path),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/v1/auth/users", post(handlers::auth::create_user))
        .route("/v1/auth/token", post(handlers::auth::issue_token))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "keygate",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
