//! Caller identity produced by authentication
//!
//! The identity is attached to a request for the lifetime of one call and
//! never persisted.

use serde::{Deserialize, Serialize};

/// The mechanism a caller authenticated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Short-lived bearer token resolved in the token store
    Ephemeral,
    /// Long-lived API key resolved in the key registry
    Persistent,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Ephemeral => write!(f, "ephemeral"),
            AuthMode::Persistent => write!(f, "persistent"),
        }
    }
}

/// Normalized result of a successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Username that owns the presented credential
    pub owner: String,

    /// Which mechanism validated the credential
    pub mode: AuthMode,

    /// Identifier of the persistent key, when `mode` is `Persistent`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl CallerIdentity {
    /// Identity from a validated ephemeral bearer token
    pub fn ephemeral(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            mode: AuthMode::Ephemeral,
            key_id: None,
        }
    }

    /// Identity from a validated persistent API key
    pub fn persistent(owner: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            mode: AuthMode::Persistent,
            key_id: Some(key_id.into()),
        }
    }
}
