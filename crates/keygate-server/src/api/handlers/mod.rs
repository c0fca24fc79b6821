//! Request handlers

pub mod apikey;
pub mod auth;
pub mod proxy;

use keygate_auth::{ApiKeyRegistry, Authenticator};
use serde::Serialize;

use crate::proxy::ProxyGateway;

/// Shared application state
pub struct AppState {
    pub authenticator: Authenticator,
    pub keys: ApiKeyRegistry,
    pub gateway: ProxyGateway,
}

/// The uniform success envelope
#[derive(Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
