//! Durable chat-user → order binding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat user's authenticated binding, persisted in the session store
/// under `user:{user_id}` with a TTL matching `expires_at`.
///
/// `expires_at` is carried in the record as well so that reads stay correct
/// even against a backend that does not enforce expiry itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub code: Option<String>,
    pub phone: Option<String>,
    pub authorized: bool,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    /// True when the binding is authenticated and has not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.authorized && self.order_id.is_some() && now < self.expires_at
    }
}
