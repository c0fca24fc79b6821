//! Error types for the credential layer

use thiserror::Error;

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur in the credential layer
#[derive(Error, Debug)]
pub enum AuthError {
    /// Neither credential mechanism validated
    #[error("authentication required")]
    Unauthenticated,

    /// Username/password pair did not verify
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Key issuance was requested for a username with no user record
    #[error("owner not found: {0}")]
    OwnerNotFound(String),

    /// User creation collided with an existing username
    #[error("user already exists: {0}")]
    UserExists(String),

    /// The backing record store failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A credential backend failed
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<crate::store::StorageError> for AuthError {
    fn from(err: crate::store::StorageError) -> Self {
        AuthError::Persistence(err.to_string())
    }
}
