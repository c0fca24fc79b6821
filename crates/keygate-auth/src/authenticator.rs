//! Dual-mode authenticator
//!
//! One check per inbound call: ephemeral bearer tokens first, persistent
//! API keys second, then a uniform rejection. The caller never learns
//! which mechanism was attempted or why it failed.

use std::sync::Arc;

use chrono::Utc;
use keygate_core::CallerIdentity;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::registry::ApiKeyRegistry;
use crate::store::{verify_password, RecordStore, UserRecord};
use crate::token_store::TokenStore;

/// Authenticates inbound calls against both credential categories
#[derive(Clone)]
pub struct Authenticator {
    tokens: Arc<TokenStore>,
    keys: ApiKeyRegistry,
    users: Arc<dyn RecordStore>,
}

/// Extract the token from a `Bearer <token>` header value
///
/// Malformed or empty forms are a local miss; the store is never
/// consulted for them.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

impl Authenticator {
    pub fn new(tokens: Arc<TokenStore>, keys: ApiKeyRegistry, users: Arc<dyn RecordStore>) -> Self {
        Self { tokens, keys, users }
    }

    /// Authenticate one call
    ///
    /// `authorization` is the raw `Authorization` header, if present;
    /// `api_key` is the value from the dedicated header or the query
    /// parameter fallback (equivalent carriers). Terminal: either result
    /// is final for this call, no retries.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<CallerIdentity> {
        if let Some(token) = authorization.and_then(bearer_token) {
            if let Some(owner) = self.tokens.get(token).await {
                debug!(owner = %owner, "authenticated via bearer token");
                return Ok(CallerIdentity::ephemeral(owner));
            }
        }

        if let Some(key) = api_key {
            if let Some(identity) = self.keys.validate(key).await {
                debug!(owner = %identity.owner, "authenticated via API key");
                return Ok(identity);
            }
        }

        warn!("authentication failed: no valid credential presented");
        Err(AuthError::Unauthenticated)
    }

    /// Verify a username/password pair and mint an ephemeral token
    ///
    /// The rejection is uniform for unknown users and wrong passwords.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self.users.find_user(username).await?;
        let verified = match &user {
            Some(user) => verify_password(password, &user.password_hash),
            None => false,
        };
        if !verified {
            warn!(username = %username, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let mut random = [0u8; 16];
        OsRng.fill_bytes(&mut random);
        let token = format!(
            "{}_{}_{}",
            username,
            Utc::now().timestamp_millis(),
            hex::encode(random)
        );

        self.tokens.set(&token, username, None).await;
        info!(username = %username, "issued ephemeral token");
        Ok(token)
    }

    /// Create a user record; conflict if the username is taken
    pub async fn create_user(&self, username: &str, password: &str) -> Result<UserRecord> {
        let user = UserRecord::new(username, password);
        self.users.create_user(user.clone()).await.map_err(|e| {
            if matches!(e, crate::store::StorageError::Conflict(_)) {
                AuthError::UserExists(username.to_string())
            } else {
                AuthError::Persistence(e.to_string())
            }
        })?;
        Ok(user)
    }

    /// Revoke one ephemeral token (logout)
    pub async fn logout(&self, token: &str) -> bool {
        self.tokens.delete(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use keygate_core::AuthMode;

    fn authenticator() -> Authenticator {
        let tokens = Arc::new(TokenStore::in_memory());
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let keys = ApiKeyRegistry::new(store.clone());
        Authenticator::new(tokens, keys, store)
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer a b"), None);
    }

    #[tokio::test]
    async fn test_login_then_bearer_auth() {
        let auth = authenticator();
        auth.create_user("alice", "secret").await.unwrap();

        let token = auth.login("alice", "secret").await.unwrap();
        let identity = auth
            .authenticate(Some(&format!("Bearer {}", token)), None)
            .await
            .unwrap();

        assert_eq!(identity.owner, "alice");
        assert_eq!(identity.mode, AuthMode::Ephemeral);
    }

    #[tokio::test]
    async fn test_login_rejection_is_uniform() {
        let auth = authenticator();
        auth.create_user("alice", "secret").await.unwrap();

        let unknown = auth.login("nobody", "secret").await.unwrap_err();
        let wrong = auth.login("alice", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_deleted_token_is_rejected() {
        let auth = authenticator();
        auth.create_user("alice", "secret").await.unwrap();
        let token = auth.login("alice", "secret").await.unwrap();

        assert!(auth.logout(&token).await);

        let result = auth
            .authenticate(Some(&format!("Bearer {}", token)), None)
            .await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_api_key_fallback() {
        let auth = authenticator();
        auth.create_user("bob", "pw").await.unwrap();
        let record = auth.keys.issue("bob", None, None).await.unwrap();

        // No bearer header at all
        let identity = auth.authenticate(None, Some(&record.key)).await.unwrap();
        assert_eq!(identity.mode, AuthMode::Persistent);

        // Malformed bearer falls through to the key
        let identity = auth
            .authenticate(Some("Token xyz"), Some(&record.key))
            .await
            .unwrap();
        assert_eq!(identity.owner, "bob");
    }

    #[tokio::test]
    async fn test_no_credentials_rejected() {
        let auth = authenticator();
        let result = auth.authenticate(None, None).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }
}
