//! Domain models for users, caches and the sessions issued to users

pub mod cache;
pub mod session;
pub mod user;

use thiserror::Error;

// Re-export for convenience
pub use cache::{
    Cache, CacheCategory, CacheFilter, CacheSummary, CacheView, CreateCacheRequest, NO_FINDS_YET,
    NewCache, today,
};
pub use session::{SESSION_LIFETIME_HOURS, SessionTokens};
pub use user::{NewUser, RegisterUserRequest, User, UserView};

/// Errors raised while validating domain input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A required field is absent or blank
    #[error("Enter valid {0}!")]
    MissingField(&'static str),

    /// A field is present but cannot be interpreted
    #[error("Enter valid {0}!")]
    InvalidValue(&'static str),

    /// The filter category is not a cache attribute
    #[error("Invalid category!")]
    InvalidCategory,

    /// The cache names a creator other than the owning user
    #[error("Incorrect username!")]
    CreatorMismatch,

    /// Password hashing failed
    #[error("Failed to hash password: {0}")]
    PasswordHash(String),
}

/// Take a required string field, treating blank input as missing
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, ModelError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ModelError::MissingField(field)),
    }
}
