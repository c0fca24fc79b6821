//! Server and integration configuration
//!
//! Everything comes from environment variables. Server settings use the
//! `KEYGATE_` prefix; integrations are discovered from `API_{NAME}_*`
//! variable families, one family per upstream:
//!
//! - `API_{NAME}_BASE_URL` (required; its presence declares the integration)
//! - `API_{NAME}_VERSION` (optional version path segment)
//! - `API_{NAME}_TOKEN` (bearer credential) or `API_{NAME}_API_KEY`
//!   (header credential); token wins when both are set
//! - `API_{NAME}_AUTH_MODE` (`none` | `bearer` | `apikey`) to override the
//!   mode inferred from which credential variable is set
//! - `API_{NAME}_SIGNATURE_SECRET` / `API_{NAME}_SIGNATURE_HEADER`
//! - `API_{NAME}_ORDER_WEBHOOK`

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use keygate_core::{
    normalizing_error_handler, IntegrationConfig, IntegrationRegistry, UpstreamAuth, Validator,
    ValidatorChain,
};
use tracing::{info, warn};

use crate::validators::{OrderValidator, SignatureValidator};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Server-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port (`KEYGATE_PORT`)
    pub port: u16,
    /// Redis URL for the token store (`KEYGATE_REDIS_URL`); absent means
    /// in-memory tokens only
    pub redis_url: Option<String>,
    /// Per-request upstream timeout (`KEYGATE_UPSTREAM_TIMEOUT_SECS`)
    pub upstream_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            redis_url: None,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var("KEYGATE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let redis_url = env::var("KEYGATE_REDIS_URL").ok().filter(|v| !v.is_empty());

        let upstream_timeout = env::var("KEYGATE_UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS));

        Self {
            port,
            redis_url,
            upstream_timeout,
        }
    }
}

/// Discover integrations from the process environment
pub fn integrations_from_env() -> IntegrationRegistry {
    discover_integrations(&env::vars().collect())
}

/// Discover integrations from a variable map
///
/// Every `API_{NAME}_BASE_URL` entry declares one integration named by the
/// lowercased middle segment. The rest of the family is optional.
pub fn discover_integrations(vars: &HashMap<String, String>) -> IntegrationRegistry {
    let mut registry = IntegrationRegistry::new();

    for key in vars.keys() {
        let name = match key
            .strip_prefix("API_")
            .and_then(|rest| rest.strip_suffix("_BASE_URL"))
        {
            Some(middle) if !middle.is_empty() => middle.to_lowercase(),
            _ => continue,
        };

        let (config, chain) = build_integration(&name, vars);
        info!(
            integration = %name,
            base_url = %config.base_url,
            auth = ?config.auth,
            validators = chain.len(),
            "discovered integration"
        );
        registry.register(config, chain);
    }

    if registry.is_empty() {
        warn!("no integrations configured; proxy routes will reject all requests");
    }

    registry
}

fn build_integration(name: &str, vars: &HashMap<String, String>) -> (IntegrationConfig, ValidatorChain) {
    let upper = name.to_uppercase();
    let var = |suffix: &str| {
        vars.get(&format!("API_{}_{}", upper, suffix))
            .filter(|v| !v.is_empty())
            .cloned()
    };

    // BASE_URL presence is what got us here
    let base_url = vars
        .get(&format!("API_{}_BASE_URL", upper))
        .cloned()
        .unwrap_or_default();

    let mut config = IntegrationConfig::new(name, base_url);
    if let Some(version) = var("VERSION") {
        config = config.with_version(version);
    }

    // Explicit AUTH_MODE wins; otherwise the mode is inferred, with a
    // bearer token beating a raw API key when both are present.
    let credential = var("TOKEN").or_else(|| var("API_KEY"));
    let mode = var("AUTH_MODE").and_then(|raw| match raw.parse::<UpstreamAuth>() {
        Ok(mode) => Some(mode),
        Err(e) => {
            warn!(integration = %name, error = %e, "ignoring invalid auth mode");
            None
        }
    });
    match (mode, credential) {
        (Some(UpstreamAuth::None), _) | (_, None) => {}
        (Some(mode), Some(credential)) => config = config.with_auth(mode, credential),
        (None, Some(credential)) => {
            let inferred = if var("TOKEN").is_some() {
                UpstreamAuth::Bearer
            } else {
                UpstreamAuth::ApiKey
            };
            config = config.with_auth(inferred, credential);
        }
    }

    let mut validators: Vec<Arc<dyn Validator>> = Vec::new();

    if let Some(secret) = var("SIGNATURE_SECRET") {
        let header = var("SIGNATURE_HEADER")
            .unwrap_or_else(|| format!("x-{}-signature", name.replace('_', "-")));
        validators.push(Arc::new(SignatureValidator::new(name, header, secret)));
    }

    if let Some(webhook) = var("ORDER_WEBHOOK") {
        validators.push(Arc::new(OrderValidator::new(name, webhook)));
    }

    let chain = ValidatorChain::new(validators).with_error_handler(normalizing_error_handler());
    (config, chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_base_url_declares_integration() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("UNRELATED_VAR", "ignored"),
        ]));

        assert_eq!(registry.len(), 1);
        let integration = registry.get("acme").unwrap();
        assert_eq!(integration.config.base_url, "https://api.acme.test");
        assert_eq!(integration.config.auth, UpstreamAuth::None);
        assert!(integration.chain.is_empty());
    }

    #[test]
    fn test_token_selects_bearer_over_api_key() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_TOKEN", "tok"),
            ("API_ACME_API_KEY", "ignored"),
        ]));

        let config = &registry.get("acme").unwrap().config;
        assert_eq!(config.auth, UpstreamAuth::Bearer);
        assert_eq!(config.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_api_key_without_token() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_API_KEY", "k"),
        ]));

        assert_eq!(registry.get("acme").unwrap().config.auth, UpstreamAuth::ApiKey);
    }

    #[test]
    fn test_explicit_auth_mode_overrides_inference() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_AUTH_MODE", "apikey"),
            ("API_ACME_TOKEN", "k"),
        ]));

        // The token would infer bearer; the explicit mode sends it as a key
        let config = &registry.get("acme").unwrap().config;
        assert_eq!(config.auth, UpstreamAuth::ApiKey);
        assert_eq!(config.token.as_deref(), Some("k"));
    }

    #[test]
    fn test_auth_mode_none_disables_credential() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_AUTH_MODE", "none"),
            ("API_ACME_TOKEN", "tok"),
        ]));

        let config = &registry.get("acme").unwrap().config;
        assert_eq!(config.auth, UpstreamAuth::None);
        assert!(config.auth_headers().is_empty());
    }

    #[test]
    fn test_invalid_auth_mode_falls_back_to_inference() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_AUTH_MODE", "kerberos"),
            ("API_ACME_TOKEN", "tok"),
        ]));

        assert_eq!(registry.get("acme").unwrap().config.auth, UpstreamAuth::Bearer);
    }

    #[test]
    fn test_validator_family_builds_chain() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_VERSION", "v2"),
            ("API_ACME_SIGNATURE_SECRET", "shh"),
            ("API_ACME_SIGNATURE_HEADER", "X-Acme-Sig"),
            ("API_ACME_ORDER_WEBHOOK", "https://orders.acme.test/check"),
        ]));

        let integration = registry.get("acme").unwrap();
        assert_eq!(integration.config.version.as_deref(), Some("v2"));
        assert_eq!(integration.chain.len(), 2);
    }

    #[test]
    fn test_multi_word_names_lowercase() {
        let registry = discover_integrations(&vars(&[(
            "API_MY_VENDOR_BASE_URL",
            "https://vendor.test",
        )]));

        assert!(registry.get("my_vendor").is_some());
    }

    #[test]
    fn test_empty_values_ignored() {
        let registry = discover_integrations(&vars(&[
            ("API_ACME_BASE_URL", "https://api.acme.test"),
            ("API_ACME_VERSION", ""),
            ("API_ACME_TOKEN", ""),
        ]));

        let config = &registry.get("acme").unwrap().config;
        assert!(config.version.is_none());
        assert_eq!(config.auth, UpstreamAuth::None);
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.redis_url.is_none());
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
    }
}
