//! Built-in pre-flight validators
//!
//! Concrete [`Validator`] implementations wired up by integration
//! configuration: a header signature check and an order-token check that
//! consults an external webhook.

use std::time::Duration;

use async_trait::async_trait;
use keygate_core::{ContextPatch, RequestContext, ValidationError, Validator};
use serde_json::{json, Value};
use tracing::{debug, warn};

// ============================================================================
// Signature validator
// ============================================================================

/// Requires a shared-secret signature header on every request
///
/// Rejects requests missing the configured header, and fails closed when
/// the integration has no secret configured at all.
pub struct SignatureValidator {
    name: String,
    header: String,
    secret: String,
    order: i32,
    enabled: bool,
}

impl SignatureValidator {
    pub fn new(
        integration: impl AsRef<str>,
        header: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: format!("{}-signature-validator", integration.as_ref()),
            header: header.into().to_lowercase(),
            secret: secret.into(),
            order: 1,
            enabled: true,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Validator for SignatureValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, context: &RequestContext) -> Result<ContextPatch, ValidationError> {
        if self.secret.is_empty() {
            return Err(ValidationError::new("signature secret not configured"));
        }

        let signature = context
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.header))
            .map(|(_, value)| value);

        match signature {
            Some(value) if !value.is_empty() => {
                debug!(validator = %self.name, "signature header present");
                let mut patch = ContextPatch::validated();
                patch.auth = Some(json!({ "validated": true, "signature": value }));
                Ok(patch)
            }
            _ => Err(ValidationError::new(format!(
                "missing required signature header: {}",
                self.header
            ))),
        }
    }
}

// ============================================================================
// Order validator
// ============================================================================

/// Checks an `order_token` parameter against an external webhook
///
/// The webhook receives `{"order_token": ...}` and approves with any 2xx
/// response; anything else rejects the request.
pub struct OrderValidator {
    name: String,
    webhook_url: String,
    client: reqwest::Client,
    timeout: Duration,
    order: i32,
    enabled: bool,
}

impl OrderValidator {
    pub fn new(integration: impl AsRef<str>, webhook_url: impl Into<String>) -> Self {
        Self {
            name: format!("{}-order-validator", integration.as_ref()),
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
            order: 2,
            enabled: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Validator for OrderValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, context: &RequestContext) -> Result<ContextPatch, ValidationError> {
        let token = context
            .parameters
            .get("order_token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ValidationError::new("missing required parameter: order_token"))?;

        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&json!({ "order_token": token }))
            .send()
            .await
            .map_err(|e| {
                warn!(validator = %self.name, error = %e, "order webhook unreachable");
                ValidationError::new("order validation request failed")
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(validator = %self.name, "order token approved");
            return Ok(ContextPatch::validated());
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("order validation failed");
        Err(ValidationError::new(format!(
            "[{}] {}",
            status.as_u16(),
            message
        )))
    }
}
