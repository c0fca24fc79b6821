//! Outbound proxy gateway
//!
//! Resolves an integration, runs its validator chain, and dispatches the
//! approved request upstream with the integration's own fixed credential.
//! The caller's `Authorization` header is never forwarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use keygate_core::{
    ChainOutcome, GatewayError, IntegrationRegistry, RequestContext,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use tracing::{error, info, warn};

/// Headers that must not pass through to the upstream: the caller's
/// credential, plus transport headers reqwest computes itself.
const STRIPPED_HEADERS: &[&str] = &["authorization", "host", "content-length", "connection"];

/// A successful (2xx) upstream response
#[derive(Debug)]
pub struct ProxyResponse {
    pub success: bool,
    pub data: Value,
    pub status: u16,
}

/// Forwards caller requests to configured integrations
pub struct ProxyGateway {
    registry: Arc<IntegrationRegistry>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ProxyGateway {
    pub fn new(registry: Arc<IntegrationRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Forward one request
    ///
    /// Runs the integration's validator chain against the request context
    /// first; a rejection fails with `AuthorizationDenied` and the
    /// outbound call is never attempted. The body is attached only for
    /// POST/PUT/PATCH. Failures are classified per the gateway taxonomy.
    pub async fn forward(
        &self,
        integration_name: &str,
        path: &str,
        method: &str,
        body: Option<Value>,
        caller_headers: &HashMap<String, String>,
        query: &HashMap<String, String>,
    ) -> Result<ProxyResponse, GatewayError> {
        let integration = self
            .registry
            .get(integration_name)
            .ok_or_else(|| GatewayError::unknown_integration(integration_name))?;

        // Pre-flight validation
        let context = RequestContext::new(method, path)
            .with_parameters(query.clone())
            .with_headers(caller_headers.clone());
        let context = match body.clone() {
            Some(body) => context.with_body(body),
            None => context,
        };

        match integration.chain.run(context).await {
            Ok(ChainOutcome::Approved(_)) => {}
            Ok(ChainOutcome::Rejected(detail)) => {
                return Err(GatewayError::authorization_denied(detail.message.clone())
                    .with_details(serde_json::to_value(&detail).unwrap_or(Value::Null)));
            }
            Err(e) => {
                // No error handler configured; same class to the caller.
                return Err(GatewayError::authorization_denied(e.message));
            }
        }

        let url = integration.config.url_for(path);
        let method = method
            .parse::<reqwest::Method>()
            .map_err(|_| GatewayError::internal(format!("invalid HTTP method: {}", method)))?;

        let headers = build_headers(&integration.config.auth_headers(), caller_headers);

        info!(
            integration = %integration_name,
            method = %method,
            url = %url,
            "forwarding request with fixed upstream credential"
        );

        let mut request = self
            .client
            .request(method.clone(), &url)
            .timeout(self.timeout)
            .headers(headers)
            .query(query);

        if let Some(body) = body {
            if matches!(
                method,
                reqwest::Method::POST | reqwest::Method::PUT | reqwest::Method::PATCH
            ) {
                request = request.json(&body);
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                error!(error = %e, "failed to build outbound request");
                return Err(GatewayError::internal("failed to build outbound request"));
            }
            Err(e) => {
                // Timeout, refused connection, DNS failure: all the same
                // bad-gateway class, no internal detail leaked.
                error!(error = %e, url = %url, "outbound request failed");
                return Err(GatewayError::network("unable to reach the upstream API"));
            }
        };

        let status = response.status();
        let data = read_body(response).await?;

        if status.is_success() {
            return Ok(ProxyResponse {
                success: true,
                data,
                status: status.as_u16(),
            });
        }

        let message = data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("upstream request failed")
                    .to_string()
            });
        warn!(status = %status, message = %message, "upstream returned an error");
        Err(GatewayError::upstream(status.as_u16(), message, data))
    }
}

/// Outbound headers: JSON content type, then the integration's fixed
/// credential, then caller headers minus the stripped set.
fn build_headers(
    auth_headers: &HashMap<String, String>,
    caller_headers: &HashMap<String, String>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in auth_headers {
        insert_header(&mut headers, name, value);
    }

    for (name, value) in caller_headers {
        if STRIPPED_HEADERS
            .iter()
            .any(|stripped| name.eq_ignore_ascii_case(stripped))
        {
            continue;
        }
        insert_header(&mut headers, name, value);
    }

    headers
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(header = %name, "skipping invalid outbound header"),
    }
}

/// Read an upstream body as JSON, falling back to a raw string
async fn read_body(response: reqwest::Response) -> Result<Value, GatewayError> {
    let bytes = response.bytes().await.map_err(|e| {
        error!(error = %e, "failed to read upstream response body");
        GatewayError::network("unable to read the upstream response")
    })?;

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_authorization_never_forwarded() {
        let auth: HashMap<String, String> =
            [("Authorization".to_string(), "Bearer fixed".to_string())]
                .into_iter()
                .collect();
        let caller: HashMap<String, String> = [
            ("Authorization".to_string(), "Bearer caller".to_string()),
            ("authorization".to_string(), "Bearer caller2".to_string()),
            ("X-Custom".to_string(), "yes".to_string()),
        ]
        .into_iter()
        .collect();

        let headers = build_headers(&auth, &caller);

        assert_eq!(headers.get("authorization").unwrap(), "Bearer fixed");
        assert_eq!(headers.get("x-custom").unwrap(), "yes");
    }

    #[test]
    fn test_caller_authorization_dropped_without_fixed_credential() {
        let caller: HashMap<String, String> =
            [("Authorization".to_string(), "Bearer caller".to_string())]
                .into_iter()
                .collect();

        let headers = build_headers(&HashMap::new(), &caller);
        assert!(headers.get("authorization").is_none());
    }

    #[test]
    fn test_transport_headers_stripped() {
        let caller: HashMap<String, String> = [
            ("Host".to_string(), "evil.example.com".to_string()),
            ("Content-Length".to_string(), "999".to_string()),
        ]
        .into_iter()
        .collect();

        let headers = build_headers(&HashMap::new(), &caller);
        assert!(headers.get("host").is_none());
        assert!(headers.get("content-length").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }
}
