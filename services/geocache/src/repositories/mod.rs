//! Repositories for database operations
//!
//! Handlers talk to storage only through [`GeocacheRepository`]. Two adapters
//! implement it: [`PgRepository`] for PostgreSQL and [`MemoryRepository`] for
//! in-process storage.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Cache, CacheFilter, NewCache, NewUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Errors raised by a repository
#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint rejected the write
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },

    /// A referenced record does not exist; carries the entity name
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Any other storage failure
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => RepoError::Duplicate {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            },
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                RepoError::NotFound(referenced_entity(db_err.constraint().unwrap_or_default()))
            }
            _ => RepoError::Persistence(err.to_string()),
        }
    }
}

/// Name the entity a foreign key constraint points at
///
/// Constraints follow PostgreSQL's default `<table>_<column>_fkey` naming; the
/// only columns referencing caches are `cache_id`.
fn referenced_entity(constraint: &str) -> &'static str {
    if constraint.contains("cache_id") {
        "Cache"
    } else {
        "User"
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage for users, caches and the completed/favorited associations
#[async_trait]
pub trait GeocacheRepository: Send + Sync {
    async fn create_user(&self, new_user: &NewUser) -> RepoResult<User>;

    async fn list_users(&self) -> RepoResult<Vec<User>>;

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Persist the session and update tokens currently held by `user`
    async fn save_session(&self, user: &User) -> RepoResult<()>;

    /// Delete a user together with its caches and associations
    async fn delete_user(&self, id: i64) -> RepoResult<Option<User>>;

    async fn create_cache(&self, new_cache: &NewCache) -> RepoResult<Cache>;

    async fn list_caches(&self) -> RepoResult<Vec<Cache>>;

    async fn find_cache(&self, id: i64) -> RepoResult<Option<Cache>>;

    async fn list_caches_by_creator(&self, username: &str) -> RepoResult<Vec<Cache>>;

    async fn list_caches_matching(&self, filter: &CacheFilter) -> RepoResult<Vec<Cache>>;

    /// Delete a cache together with its associations
    async fn delete_cache(&self, id: i64) -> RepoResult<Option<Cache>>;

    /// Record that `user_id` found `cache_id` on `found_on`
    ///
    /// Sets `last_found` and adds the association in one unit of work. The
    /// association is kept once per pair.
    async fn add_completed(&self, user_id: i64, cache_id: i64, found_on: &str)
    -> RepoResult<Cache>;

    async fn list_completed(&self, user_id: i64) -> RepoResult<Vec<Cache>>;

    /// Record that `user_id` favorited `cache_id`, once per pair
    async fn add_favorite(&self, user_id: i64, cache_id: i64) -> RepoResult<Cache>;

    async fn list_favorited(&self, user_id: i64) -> RepoResult<Vec<Cache>>;

    /// Check that the backing store answers
    async fn health_check(&self) -> RepoResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_keys_name_the_missing_entity() {
        assert_eq!(referenced_entity("caches_completed_cache_id_fkey"), "Cache");
        assert_eq!(referenced_entity("favorites_cache_id_fkey"), "Cache");
        assert_eq!(referenced_entity("favorites_user_id_fkey"), "User");
        assert_eq!(referenced_entity("caches_created_by_fkey"), "User");
    }
}
