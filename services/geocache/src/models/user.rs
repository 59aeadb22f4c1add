//! User model and related functionality

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{CacheSummary, ModelError, SessionTokens, required};

/// User entity
///
/// Deliberately not `Serialize`: the password hash and the tokens only leave
/// the process through [`UserView`], which omits them.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub session_token: String,
    pub session_expiration: DateTime<Utc>,
    pub update_token: String,
}

/// Registration payload as received over the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated user ready to be stored
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub session: SessionTokens,
}

/// Public representation of a user with the caches it is associated with
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub created_caches: Vec<CacheSummary>,
    pub completed_caches: Vec<CacheSummary>,
    pub favorited_caches: Vec<CacheSummary>,
}

impl NewUser {
    /// Validate a registration request, hash its password and issue a session
    ///
    /// Uniqueness of username and email is the store's concern and is checked
    /// by the caller.
    pub fn register(request: RegisterUserRequest) -> Result<Self, ModelError> {
        let name = required(request.name, "name")?;
        let username = required(request.username, "username")?;
        let email = required(request.email, "email")?;
        let password = required(request.password, "password")?;

        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ModelError::PasswordHash(e.to_string()))?
            .to_string();

        Ok(Self {
            name,
            username,
            email,
            password_hash,
            session: SessionTokens::issue(),
        })
    }
}

impl User {
    /// Replace both tokens and push the session expiry a full lifetime ahead
    ///
    /// Previously issued tokens stop verifying once this returns.
    pub fn renew_session(&mut self) {
        self.apply_session(SessionTokens::issue());
    }

    pub fn apply_session(&mut self, session: SessionTokens) {
        self.session_token = session.session_token;
        self.update_token = session.update_token;
        self.session_expiration = session.session_expiration;
    }

    pub fn session(&self) -> SessionTokens {
        SessionTokens {
            session_token: self.session_token.clone(),
            update_token: self.update_token.clone(),
            session_expiration: self.session_expiration,
        }
    }

    /// Check a candidate password against the stored hash
    pub fn verify_password(&self, candidate: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// True iff `token` is the current session token and it has not expired
    pub fn verify_session_token(&self, token: &str) -> bool {
        self.verify_session_token_at(token, Utc::now())
    }

    pub fn verify_session_token_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.session_token == token && now < self.session_expiration
    }

    /// True iff `token` is the current update token; update tokens do not expire
    pub fn verify_update_token(&self, token: &str) -> bool {
        self.update_token == token
    }

    pub fn into_view(
        self,
        created_caches: Vec<CacheSummary>,
        completed_caches: Vec<CacheSummary>,
        favorited_caches: Vec<CacheSummary>,
    ) -> UserView {
        UserView {
            id: self.id,
            name: self.name,
            username: self.username,
            created_caches,
            completed_caches,
            favorited_caches,
        }
    }
}
