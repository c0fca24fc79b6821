//! Record store abstraction
//!
//! Users and persistent API keys live in an external keyed store. This
//! module provides the trait plus the default in-memory implementation;
//! a PostgreSQL implementation lives behind the `postgres` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Error type for record store operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate record: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),
}

/// A registered user
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// SHA-256 hex digest of the password
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: hash_password(password),
            created_at: Utc::now(),
        }
    }
}

/// A persistent API key record
///
/// The `key` value is globally unique and never shown in full after
/// issuance.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: String,
    pub key: String,
    pub owner: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Hash a password for storage (SHA-256 hex)
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    hash_password(password) == password_hash
}

/// Keyed store for user and API key records
#[async_trait]
pub trait RecordStore: Send + Sync {
    // User records

    /// Insert a user; `Conflict` if the username is taken
    async fn create_user(&self, user: UserRecord) -> Result<(), StorageError>;

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    async fn delete_user(&self, username: &str) -> Result<bool, StorageError>;

    // API key records

    /// Insert a key record; `Conflict` on a uniqueness collision
    async fn insert_key(&self, record: ApiKeyRecord) -> Result<(), StorageError>;

    async fn find_key_by_value(&self, key: &str) -> Result<Option<ApiKeyRecord>, StorageError>;

    /// All keys for an owner, most-recent-first
    async fn list_keys_for_owner(&self, owner: &str) -> Result<Vec<ApiKeyRecord>, StorageError>;

    /// Toggle a key, scoped to its owner; false when no record matches
    async fn update_key_active(
        &self,
        owner: &str,
        id: &str,
        active: bool,
    ) -> Result<bool, StorageError>;

    /// Record a successful validation; callers treat failures as non-fatal
    async fn touch_key_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Delete a key, scoped to its owner; false when no record matches
    async fn delete_key(&self, owner: &str, id: &str) -> Result<bool, StorageError>;
}

/// In-memory record store
///
/// Default backing store for development and tests; data is lost on
/// restart.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    users: RwLock<HashMap<String, UserRecord>>,
    keys: RwLock<Vec<ApiKeyRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_user(&self, user: UserRecord) -> Result<(), StorageError> {
        let mut users = self.users.write().unwrap();
        if users.contains_key(&user.username) {
            return Err(StorageError::Conflict(user.username));
        }
        info!(username = %user.username, "created user record");
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let users = self.users.read().unwrap();
        Ok(users.get(username).cloned())
    }

    async fn delete_user(&self, username: &str) -> Result<bool, StorageError> {
        let mut users = self.users.write().unwrap();
        Ok(users.remove(username).is_some())
    }

    async fn insert_key(&self, record: ApiKeyRecord) -> Result<(), StorageError> {
        let mut keys = self.keys.write().unwrap();
        if keys.iter().any(|k| k.key == record.key || k.id == record.id) {
            return Err(StorageError::Conflict(record.id));
        }
        keys.push(record);
        Ok(())
    }

    async fn find_key_by_value(&self, key: &str) -> Result<Option<ApiKeyRecord>, StorageError> {
        let keys = self.keys.read().unwrap();
        Ok(keys.iter().find(|k| k.key == key).cloned())
    }

    async fn list_keys_for_owner(&self, owner: &str) -> Result<Vec<ApiKeyRecord>, StorageError> {
        let keys = self.keys.read().unwrap();
        let mut owned: Vec<_> = keys.iter().filter(|k| k.owner == owner).cloned().collect();
        // Newest insertions first, then a stable sort keeps that order for
        // records created in the same instant.
        owned.reverse();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update_key_active(
        &self,
        owner: &str,
        id: &str,
        active: bool,
    ) -> Result<bool, StorageError> {
        let mut keys = self.keys.write().unwrap();
        match keys.iter_mut().find(|k| k.owner == owner && k.id == id) {
            Some(record) => {
                record.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_key_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut keys = self.keys.write().unwrap();
        match keys.iter_mut().find(|k| k.id == id) {
            Some(record) => {
                record.last_used_at = Some(at);
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn delete_key(&self, owner: &str, id: &str) -> Result<bool, StorageError> {
        let mut keys = self.keys.write().unwrap();
        let before = keys.len();
        keys.retain(|k| !(k.owner == owner && k.id == id));
        Ok(keys.len() < before)
    }
}
