//! Shopper session domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// An authenticated browser session.
///
/// Only the SHA-256 hash of the session token is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for `user_id` valid for `ttl`.
    pub fn new(user_id: UserId, token_hash: String, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            token_hash,
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
