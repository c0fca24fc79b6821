//! Credential lifecycle for the keygate API gateway
//!
//! Two distinct credential categories live here:
//!
//! - Ephemeral bearer tokens, minted after password login and resolved in
//!   the [`TokenStore`] (redis-durable with a sticky in-memory fallback)
//! - Persistent API keys, owner-scoped and revocable, managed by the
//!   [`ApiKeyRegistry`] over a pluggable [`RecordStore`]
//!
//! The [`Authenticator`] ties both together into a single dual-mode check
//! that yields a normalized `CallerIdentity` or a uniform rejection.

pub mod authenticator;
pub mod error;
pub mod registry;
pub mod store;
pub mod token_store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use authenticator::Authenticator;
pub use error::{AuthError, Result};
pub use registry::{mask_key, ApiKeyRegistry};
pub use store::{
    hash_password, verify_password, ApiKeyRecord, MemoryRecordStore, RecordStore, StorageError,
    UserRecord,
};
pub use token_store::TokenStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRecordStore;
