//! Gateway forwarding tests against a real local upstream
//!
//! Each test spins up a throwaway axum upstream on an ephemeral port and
//! drives the `ProxyGateway` directly, checking validator short-circuits,
//! credential substitution and failure classification.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use keygate_core::{
    normalizing_error_handler, ContextPatch, ErrorKind, IntegrationConfig, IntegrationRegistry,
    RequestContext, UpstreamAuth, ValidationError, Validator, ValidatorChain,
};
use keygate_server::ProxyGateway;
use serde_json::{json, Value};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn gateway(registry: IntegrationRegistry) -> ProxyGateway {
    ProxyGateway::new(Arc::new(registry), Duration::from_secs(5))
}

/// Requires a `token` query parameter; used to observe chain short-circuits.
struct RequireToken;

#[async_trait]
impl Validator for RequireToken {
    fn name(&self) -> &str {
        "require-token"
    }

    async fn run(&self, context: &RequestContext) -> Result<ContextPatch, ValidationError> {
        if context.parameters.contains_key("token") {
            Ok(ContextPatch::validated())
        } else {
            Err(ValidationError::new("missing required parameter: token"))
        }
    }
}

#[tokio::test]
async fn test_rejected_request_never_reaches_upstream() {
    let hits = Arc::new(AtomicUsize::new(0));
    let upstream = Router::new()
        .route(
            "/resource",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "ok": true }))
            }),
        )
        .with_state(hits.clone());
    let addr = serve(upstream).await;

    let mut registry = IntegrationRegistry::new();
    registry.register(
        IntegrationConfig::new("acme", format!("http://{}", addr)),
        ValidatorChain::new(vec![Arc::new(RequireToken)])
            .with_error_handler(normalizing_error_handler()),
    );
    let gateway = gateway(registry);

    // Without the token the chain rejects and nothing goes out
    let err = gateway
        .forward("acme", "resource", "GET", None, &HashMap::new(), &HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AuthorizationDenied);
    assert_eq!(err.status_code(), 401);
    let details = err.details.unwrap();
    assert_eq!(details["validator"], "require-token");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // With the token the request passes through
    let query: HashMap<String, String> = [("token".to_string(), "t".to_string())]
        .into_iter()
        .collect();
    let response = gateway
        .forward("acme", "resource", "GET", None, &HashMap::new(), &query)
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.status, 200);
    assert_eq!(response.data["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fixed_credential_replaces_caller_authorization() {
    let upstream = Router::new().route(
        "/whoami",
        any(|headers: HeaderMap| async move {
            let echoed: HashMap<String, String> = headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            Json(echoed)
        }),
    );
    let addr = serve(upstream).await;

    let mut registry = IntegrationRegistry::new();
    registry.register(
        IntegrationConfig::new("acme", format!("http://{}", addr))
            .with_auth(UpstreamAuth::Bearer, "fixed-tok"),
        ValidatorChain::new(vec![]),
    );
    let gateway = gateway(registry);

    let caller_headers: HashMap<String, String> = [
        ("Authorization".to_string(), "Bearer caller-tok".to_string()),
        ("X-Request-Id".to_string(), "42".to_string()),
    ]
    .into_iter()
    .collect();

    let response = gateway
        .forward("acme", "whoami", "GET", None, &caller_headers, &HashMap::new())
        .await
        .unwrap();

    assert_eq!(response.data["authorization"], "Bearer fixed-tok");
    assert_eq!(response.data["x-request-id"], "42");
}

#[tokio::test]
async fn test_version_segment_and_body_forwarding() {
    let upstream = Router::new().route(
        "/v2/items",
        post(|Json(body): Json<Value>| async move { Json(json!({ "received": body })) }),
    );
    let addr = serve(upstream).await;

    let mut registry = IntegrationRegistry::new();
    registry.register(
        IntegrationConfig::new("acme", format!("http://{}", addr)).with_version("v2"),
        ValidatorChain::new(vec![]),
    );
    let gateway = gateway(registry);

    let response = gateway
        .forward(
            "acme",
            "items",
            "POST",
            Some(json!({ "sku": "a-1" })),
            &HashMap::new(),
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.data["received"]["sku"], "a-1");
}

#[tokio::test]
async fn test_unknown_integration() {
    let gateway = gateway(IntegrationRegistry::new());

    let err = gateway
        .forward("nope", "", "GET", None, &HashMap::new(), &HashMap::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::UnknownIntegration);
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_upstream_error_keeps_status_and_message() {
    let upstream = Router::new().route(
        "/missing",
        get(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "no such resource" })),
            )
        }),
    );
    let addr = serve(upstream).await;

    let mut registry = IntegrationRegistry::new();
    registry.register(
        IntegrationConfig::new("acme", format!("http://{}", addr)),
        ValidatorChain::new(vec![]),
    );
    let gateway = gateway(registry);

    let err = gateway
        .forward("acme", "missing", "GET", None, &HashMap::new(), &HashMap::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::UpstreamError);
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.message, "no such resource");
    assert_eq!(err.details.unwrap()["message"], "no such resource");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let mut registry = IntegrationRegistry::new();
    // Port 1 refuses connections
    registry.register(
        IntegrationConfig::new("acme", "http://127.0.0.1:1"),
        ValidatorChain::new(vec![]),
    );
    let gateway = ProxyGateway::new(Arc::new(registry), Duration::from_millis(500));

    let err = gateway
        .forward("acme", "anything", "GET", None, &HashMap::new(), &HashMap::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert_eq!(err.status_code(), 502);
}
