//! Request authentication middleware
//!
//! Runs the dual-mode authenticator for every protected route and stashes
//! the resulting [`CallerIdentity`] as a request extension. The API key may
//! arrive in the `X-API-Key` header or the `api_key` query parameter;
//! the header is checked first.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::handlers::AppState;

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query_api_key(&request));

    let identity = state
        .authenticator
        .authenticate(authorization.as_deref(), api_key.as_deref())
        .await?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn query_api_key(request: &Request) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(params)| params.get("api_key").cloned())
}
