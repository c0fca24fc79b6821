//! Pre-flight validator chain
//!
//! Each integration carries an ordered list of named validators that run
//! sequentially against a shared request context before the gateway
//! forwards anything upstream. A validator returns a partial patch merged
//! shallowly into the context for the next validator; the first failure
//! stops the chain.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// A validator rejected the request
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The shared mutable context a chain folds over
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    /// HTTP method of the inbound request
    pub method: String,

    /// Path suffix being forwarded
    pub path: String,

    /// URL query parameters
    pub parameters: HashMap<String, String>,

    /// Caller-supplied headers
    pub headers: HashMap<String, String>,

    /// JSON request body, if any
    pub body: Option<Value>,

    /// Accumulated validation state (e.g. `{"validated": true}`)
    pub auth: Option<Value>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Shallow-merge a patch into this context
    ///
    /// Fields present in the patch replace the corresponding field
    /// wholesale; absent fields are untouched.
    pub fn apply(&mut self, patch: ContextPatch) {
        if let Some(parameters) = patch.parameters {
            self.parameters = parameters;
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(body) = patch.body {
            self.body = Some(body);
        }
        if let Some(auth) = patch.auth {
            self.auth = Some(auth);
        }
    }
}

/// Partial context returned by a validator
#[derive(Debug, Clone, Default)]
pub struct ContextPatch {
    pub parameters: Option<HashMap<String, String>>,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<Value>,
    pub auth: Option<Value>,
}

impl ContextPatch {
    /// The common success patch: mark the request validated
    pub fn validated() -> Self {
        Self {
            auth: Some(serde_json::json!({ "validated": true })),
            ..Default::default()
        }
    }
}

/// A named, ordered pre-flight check
#[async_trait]
pub trait Validator: Send + Sync {
    /// Name used in logs and rejection payloads
    fn name(&self) -> &str;

    /// Position in the chain; lower runs first
    fn order(&self) -> i32 {
        0
    }

    /// Disabled validators are dropped at chain construction
    fn enabled(&self) -> bool {
        true
    }

    /// Run the check against the accumulated context
    async fn run(&self, context: &RequestContext) -> Result<ContextPatch, ValidationError>;
}

/// Normalized rejection produced by a chain's error handler
#[derive(Debug, Clone, Serialize)]
pub struct RejectionDetail {
    /// The validator's error message
    pub message: String,
    /// Name of the validator that rejected the request
    pub validator: String,
    /// When the rejection happened
    pub timestamp: DateTime<Utc>,
}

/// Result of running a chain to completion
#[derive(Debug)]
pub enum ChainOutcome {
    /// All validators passed; carries the folded context
    Approved(RequestContext),
    /// A validator failed and the error handler recovered it
    ///
    /// Still an authorization failure to the caller.
    Rejected(RejectionDetail),
}

/// Error handler invoked when a validator fails
///
/// Receives the error, the failing validator's name and the context as
/// accumulated up to the failure, and produces the normalized rejection
/// that becomes the chain's result.
pub type ErrorHandler =
    Arc<dyn Fn(&ValidationError, &str, &RequestContext) -> RejectionDetail + Send + Sync>;

/// The default handler: message, validator name, timestamp
pub fn normalizing_error_handler() -> ErrorHandler {
    Arc::new(|error, validator, _context| RejectionDetail {
        message: error.message.clone(),
        validator: validator.to_string(),
        timestamp: Utc::now(),
    })
}

/// Ordered pre-flight pipeline for one integration
///
/// Constructed once from the configured validator list: disabled entries
/// are dropped and the rest sorted ascending by `order` (stable, so ties
/// keep declaration order).
pub struct ValidatorChain {
    validators: Vec<Arc<dyn Validator>>,
    error_handler: Option<ErrorHandler>,
}

impl ValidatorChain {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        let mut validators: Vec<_> = validators.into_iter().filter(|v| v.enabled()).collect();
        validators.sort_by_key(|v| v.order());
        Self {
            validators,
            error_handler: None,
        }
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Number of active validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Fold the validators over the context
    ///
    /// Short-circuits on the first failure. With an error handler the
    /// failure is recovered into `ChainOutcome::Rejected`; without one the
    /// `ValidationError` propagates unchanged. A chain with zero
    /// validators returns the input context untouched.
    pub async fn run(&self, context: RequestContext) -> Result<ChainOutcome, ValidationError> {
        let mut current = context;

        for validator in &self.validators {
            debug!(validator = %validator.name(), "running validator");

            match validator.run(&current).await {
                Ok(patch) => {
                    current.apply(patch);
                    debug!(validator = %validator.name(), "validator passed");
                }
                Err(error) => {
                    warn!(
                        validator = %validator.name(),
                        error = %error,
                        "validator rejected request"
                    );

                    if let Some(handler) = &self.error_handler {
                        return Ok(ChainOutcome::Rejected(handler(
                            &error,
                            validator.name(),
                            &current,
                        )));
                    }
                    return Err(error);
                }
            }
        }

        Ok(ChainOutcome::Approved(current))
    }
}
