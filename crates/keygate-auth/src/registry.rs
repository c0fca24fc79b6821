//! Persistent API key registry
//!
//! Issues, validates, lists and revokes long-lived keys, scoped to the
//! owning user. Keys are opaque `sk_`-prefixed values with 32 bytes of
//! OS entropy; the full value is returned exactly once, at issuance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keygate_core::CallerIdentity;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::store::{ApiKeyRecord, RecordStore};

/// Registry of persistent API keys over a pluggable record store
#[derive(Clone)]
pub struct ApiKeyRegistry {
    store: Arc<dyn RecordStore>,
}

/// Generate an opaque, prefixed, high-entropy key value
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("sk_{}", hex::encode(bytes))
}

/// Mask a key for listings: first 8 + last 4 characters
pub fn mask_key(key: &str) -> String {
    if key.len() <= 12 {
        return key.to_string();
    }
    format!("{}...{}", &key[..8], &key[key.len() - 4..])
}

impl ApiKeyRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Issue a new key for an owner
    ///
    /// Fails with `OwnerNotFound` when the owner has no user record. A
    /// uniqueness collision on the generated key is surfaced as a
    /// persistence error, not retried; the key space makes it negligible.
    pub async fn issue(
        &self,
        owner: &str,
        name: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKeyRecord> {
        if self.store.find_user(owner).await?.is_none() {
            return Err(AuthError::OwnerNotFound(owner.to_string()));
        }

        let record = ApiKeyRecord {
            id: uuid::Uuid::new_v4().to_string(),
            key: generate_key(),
            owner: owner.to_string(),
            name: name.unwrap_or_else(|| format!("API key for {}", owner)),
            is_active: true,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };

        self.store
            .insert_key(record.clone())
            .await
            .map_err(|e| AuthError::Persistence(e.to_string()))?;

        info!(
            owner = %owner,
            key_id = %record.id,
            key = %mask_key(&record.key),
            "issued API key"
        );
        Ok(record)
    }

    /// Validate a key value
    ///
    /// Returns the caller identity for an active, unexpired key. Unknown,
    /// inactive and expired keys are all absent, indistinguishably; store
    /// errors are logged and also absent, never surfaced to the caller.
    /// On success the key's `last_used_at` is updated fire-and-forget.
    pub async fn validate(&self, key: &str) -> Option<CallerIdentity> {
        let record = match self.store.find_key_by_value(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "key lookup failed");
                return None;
            }
        };

        if !record.is_active {
            debug!(key_id = %record.id, "rejecting inactive key");
            return None;
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at < Utc::now() {
                debug!(key_id = %record.id, "rejecting expired key");
                return None;
            }
        }

        // Best-effort usage timestamp; a failure must not fail validation.
        let store = self.store.clone();
        let id = record.id.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_key_last_used(&id, Utc::now()).await {
                warn!(key_id = %id, error = %e, "failed to update last_used_at");
            }
        });

        Some(CallerIdentity::persistent(record.owner, record.id))
    }

    /// All keys for an owner, most-recent-first
    pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<ApiKeyRecord>> {
        Ok(self.store.list_keys_for_owner(owner).await?)
    }

    /// Delete a key, scoped to its owner
    ///
    /// False (not an error) when no record matches that owner, so the
    /// existence of another owner's key is never confirmed.
    pub async fn revoke(&self, owner: &str, key_id: &str) -> Result<bool> {
        let removed = self.store.delete_key(owner, key_id).await?;
        if removed {
            info!(owner = %owner, key_id = %key_id, "revoked API key");
        }
        Ok(removed)
    }

    /// Toggle a key, scoped to its owner; false when no record matches
    pub async fn set_active(&self, owner: &str, key_id: &str, active: bool) -> Result<bool> {
        let updated = self.store.update_key_active(owner, key_id, active).await?;
        if updated {
            info!(owner = %owner, key_id = %key_id, active = active, "toggled API key");
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecordStore, UserRecord};
    use keygate_core::AuthMode;

    async fn registry_with_user(username: &str) -> ApiKeyRegistry {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .create_user(UserRecord::new(username, "pw"))
            .await
            .unwrap();
        ApiKeyRegistry::new(store)
    }

    #[tokio::test]
    async fn test_issue_requires_owner() {
        let registry = registry_with_user("alice").await;

        let result = registry.issue("nobody", None, None).await;
        assert!(matches!(result, Err(AuthError::OwnerNotFound(_))));
    }

    #[tokio::test]
    async fn test_issued_keys_are_distinct() {
        let registry = registry_with_user("alice").await;

        let a = registry.issue("alice", None, None).await.unwrap();
        let b = registry.issue("alice", None, None).await.unwrap();

        assert!(a.key.starts_with("sk_"));
        assert_eq!(a.key.len(), 3 + 64);
        assert_ne!(a.key, b.key);
    }

    #[tokio::test]
    async fn test_validate_active_key() {
        let registry = registry_with_user("alice").await;
        let record = registry.issue("alice", None, None).await.unwrap();

        let identity = registry.validate(&record.key).await.unwrap();
        assert_eq!(identity.owner, "alice");
        assert_eq!(identity.mode, AuthMode::Persistent);
        assert_eq!(identity.key_id.as_deref(), Some(record.id.as_str()));
    }

    #[tokio::test]
    async fn test_validate_absent_indistinguishably() {
        let registry = registry_with_user("alice").await;

        // Wrong key
        assert!(registry.validate("sk_wrong").await.is_none());

        // Inactive key
        let inactive = registry.issue("alice", None, None).await.unwrap();
        registry
            .set_active("alice", &inactive.id, false)
            .await
            .unwrap();
        assert!(registry.validate(&inactive.key).await.is_none());

        // Expired key
        let expired = registry
            .issue(
                "alice",
                None,
                Some(Utc::now() - chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        assert!(registry.validate(&expired.key).await.is_none());
    }

    #[tokio::test]
    async fn test_revoke_scoped_to_owner() {
        let registry = registry_with_user("alice").await;
        let record = registry.issue("alice", None, None).await.unwrap();

        assert!(!registry.revoke("mallory", &record.id).await.unwrap());
        assert!(registry.validate(&record.key).await.is_some());

        assert!(registry.revoke("alice", &record.id).await.unwrap());
        assert!(registry.validate(&record.key).await.is_none());
        // Second revoke reports false, not an error
        assert!(!registry.revoke("alice", &record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reactivated_key_validates_again() {
        let registry = registry_with_user("alice").await;
        let record = registry.issue("alice", None, None).await.unwrap();

        registry.set_active("alice", &record.id, false).await.unwrap();
        assert!(registry.validate(&record.key).await.is_none());

        registry.set_active("alice", &record.id, true).await.unwrap();
        assert!(registry.validate(&record.key).await.is_some());
    }

    #[test]
    fn test_mask_key() {
        let masked = mask_key("sk_0123456789abcdef");
        assert_eq!(masked, "sk_01234...cdef");
        // Short values are left alone rather than over-masked
        assert_eq!(mask_key("sk_short"), "sk_short");
    }
}
