//! Third-party integration configuration
//!
//! An integration describes one configured upstream: its base URL, an
//! optional version segment, and the gateway's own fixed credential for
//! that upstream. Configuration is immutable after load; URL and header
//! construction are pure functions of the record.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::validator::ValidatorChain;

/// How the gateway authenticates against the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamAuth {
    /// No upstream credential
    #[default]
    None,
    /// `Authorization: Bearer {token}`
    Bearer,
    /// `X-API-Key: {token}`
    ApiKey,
}

impl std::str::FromStr for UpstreamAuth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(UpstreamAuth::None),
            "bearer" => Ok(UpstreamAuth::Bearer),
            "apikey" | "api_key" | "api-key" => Ok(UpstreamAuth::ApiKey),
            _ => Err(format!("unknown upstream auth mode: {}", s)),
        }
    }
}

/// Configuration for one upstream integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Integration name (route segment and registry key)
    pub name: String,

    /// Upstream base URL
    pub base_url: String,

    /// Optional API version segment inserted between base URL and path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Upstream authentication mode
    #[serde(default)]
    pub auth: UpstreamAuth,

    /// The gateway's fixed upstream credential
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl IntegrationConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            version: None,
            auth: UpstreamAuth::None,
            token: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_auth(mut self, auth: UpstreamAuth, token: impl Into<String>) -> Self {
        self.auth = auth;
        self.token = Some(token.into());
        self
    }

    /// Build the fully-qualified outbound URL for a path suffix
    ///
    /// Joins the base URL (trailing slash stripped) with the version
    /// segment (if any) and the path (leading slash stripped). An empty
    /// path yields `base[/version]` with no trailing segment.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        match (&self.version, path.is_empty()) {
            (Some(v), true) => format!("{}/{}", base, v),
            (Some(v), false) => format!("{}/{}/{}", base, v, path),
            (None, true) => base.to_string(),
            (None, false) => format!("{}/{}", base, path),
        }
    }

    /// Authorization headers for the upstream, from the fixed credential
    ///
    /// Returns an empty map when no credential is configured. In bearer
    /// mode a `Bearer ` prefix is added unless the token already carries
    /// one.
    pub fn auth_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        let token = match &self.token {
            Some(t) if !t.is_empty() => t,
            _ => return headers,
        };

        match self.auth {
            UpstreamAuth::None => {}
            UpstreamAuth::Bearer => {
                let value = if token.starts_with("Bearer ") {
                    token.clone()
                } else {
                    format!("Bearer {}", token)
                };
                headers.insert("Authorization".to_string(), value);
            }
            UpstreamAuth::ApiKey => {
                headers.insert("X-API-Key".to_string(), token.clone());
            }
        }

        headers
    }
}

/// One registered integration: its config plus its pre-flight chain
pub struct Integration {
    pub config: IntegrationConfig,
    pub chain: ValidatorChain,
}

/// Process-wide, read-only registry of integrations
///
/// Loaded once at startup; lookups resolve the route segment to the
/// integration.
#[derive(Default)]
pub struct IntegrationRegistry {
    entries: HashMap<String, Arc<Integration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, config: IntegrationConfig, chain: ValidatorChain) {
        let name = config.name.clone();
        self.entries.insert(name, Arc::new(Integration { config, chain }));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Integration>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
