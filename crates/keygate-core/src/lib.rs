//! Core types for the keygate API gateway
//!
//! This crate holds the pure, I/O-free building blocks shared by the
//! credential layer and the HTTP server:
//!
//! - Error taxonomy (`ErrorKind`, `GatewayError`) with HTTP status mapping
//! - `CallerIdentity` produced by authentication
//! - `IntegrationConfig` describing a third-party upstream (URL and
//!   authorization header construction)
//! - The `Validator` trait and `ValidatorChain` pre-flight pipeline

pub mod error;
pub mod identity;
pub mod integration;
pub mod validator;

pub use error::{ErrorKind, GatewayError};
pub use identity::{AuthMode, CallerIdentity};
pub use integration::{Integration, IntegrationConfig, IntegrationRegistry, UpstreamAuth};
pub use validator::{
    normalizing_error_handler, ChainOutcome, ContextPatch, ErrorHandler, RejectionDetail,
    RequestContext, ValidationError, Validator, ValidatorChain,
};
