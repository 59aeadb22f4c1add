//! Session credentials issued to users

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};

/// How long a session token stays valid after it is issued
pub const SESSION_LIFETIME_HOURS: i64 = 24;

const TOKEN_LENGTH: usize = 40;

/// Session and update tokens together with the session expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub session_token: String,
    pub update_token: String,
    pub session_expiration: DateTime<Utc>,
}

impl SessionTokens {
    /// Issue a fresh pair of tokens expiring one session lifetime from now
    pub fn issue() -> Self {
        Self::issue_at(Utc::now())
    }

    /// Issue a fresh pair of tokens relative to `now`
    pub fn issue_at(now: DateTime<Utc>) -> Self {
        Self {
            session_token: generate_token(),
            update_token: generate_token(),
            session_expiration: now + Duration::hours(SESSION_LIFETIME_HOURS),
        }
    }
}

/// Generate a random alphanumeric token
fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
