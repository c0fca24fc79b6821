//! Gateway error taxonomy
//!
//! Every failure that crosses the gateway boundary is represented as a
//! `GatewayError` tagged with an `ErrorKind`. The HTTP layer converts this
//! into a uniform `{success: false, message, error}` envelope; internal
//! detail is logged, never returned, except an upstream's own response
//! body which is already public.

use serde::Serialize;
use thiserror::Error;

/// Classification of gateway failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Integration name is not configured
    UnknownIntegration,
    /// Neither credential mechanism validated
    Unauthenticated,
    /// The validator chain rejected the request
    AuthorizationDenied,
    /// The outbound call returned a non-2xx response
    UpstreamError,
    /// The outbound call could not reach the target (including timeout)
    NetworkError,
    /// Unexpected local failure
    InternalError,
}

/// A classified gateway failure with an optional structured payload
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    /// Failure classification
    pub kind: ErrorKind,
    /// Message safe to return to the caller
    pub message: String,
    /// Structured detail (validator rejection, upstream body)
    pub details: Option<serde_json::Value>,
    /// Status returned by the upstream, for `UpstreamError`
    pub upstream_status: Option<u16>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            upstream_status: None,
        }
    }

    /// Attach a structured detail payload
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unknown_integration(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownIntegration,
            format!("unknown integration: {}", name),
        )
    }

    /// Uniform rejection for failed authentication
    ///
    /// The message never distinguishes wrong-format, wrong-value or
    /// expired credentials.
    pub fn unauthenticated() -> Self {
        Self::new(
            ErrorKind::Unauthenticated,
            "authentication required: provide a valid bearer token or API key",
        )
    }

    pub fn authorization_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationDenied, message)
    }

    pub fn upstream(status: u16, message: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            kind: ErrorKind::UpstreamError,
            message: message.into(),
            details: Some(body),
            upstream_status: Some(status),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// HTTP status code for this failure
    ///
    /// `UpstreamError` surfaces the upstream's own status; everything else
    /// maps per classification.
    pub fn status_code(&self) -> u16 {
        match self.kind {
            ErrorKind::UnknownIntegration => 400,
            ErrorKind::Unauthenticated | ErrorKind::AuthorizationDenied => 401,
            ErrorKind::UpstreamError => self.upstream_status.unwrap_or(502),
            ErrorKind::NetworkError => 502,
            ErrorKind::InternalError => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::unknown_integration("x").status_code(), 400);
        assert_eq!(GatewayError::unauthenticated().status_code(), 401);
        assert_eq!(GatewayError::authorization_denied("no").status_code(), 401);
        assert_eq!(GatewayError::network("down").status_code(), 502);
        assert_eq!(GatewayError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_upstream_error_carries_status_and_body() {
        let err = GatewayError::upstream(404, "not found", serde_json::json!({"code": 404}));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.kind, ErrorKind::UpstreamError);
        assert_eq!(err.details.unwrap()["code"], 404);
    }
}
