//! keygate HTTP gateway
//!
//! Authenticates callers with either credential category, runs the
//! per-integration validator chain, and forwards approved requests to the
//! configured upstream under the gateway's own fixed credential.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `POST /v1/auth/users` - Create a user record
//! - `POST /v1/auth/token` - Password login, returns an ephemeral token
//! - `POST /v1/keys` - Issue a persistent API key (full value shown once)
//! - `GET /v1/keys` - List the caller's keys (masked)
//! - `PATCH /v1/keys/{id}` - Activate/deactivate a key
//! - `DELETE /v1/keys/{id}` - Revoke a key
//! - `ANY /v1/proxy/{integration}[/{*path}]` - Authenticated passthrough

pub mod api;
pub mod config;
pub mod proxy;
pub mod validators;

pub use api::handlers::AppState;
pub use api::create_router;
pub use config::ServerConfig;
pub use proxy::{ProxyGateway, ProxyResponse};
