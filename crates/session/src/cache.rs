//! Short-TTL per-user cache of full order lists.
//!
//! Repeatedly opening the "my orders" menu should not hammer the CRM, so
//! the last fetched list is kept for a short window (60 s by default).
//! Entries expire naturally; there is no active invalidation on order
//! mutation, and staleness within the TTL is accepted behaviour.

use std::sync::Arc;

use tracing::warn;

use parcelbot_core::Order;

use crate::KeyValueBackend;

pub struct OrderListCache<B> {
    backend: Arc<B>,
}

fn cache_key(user_id: i64) -> String {
    format!("user:{user_id}:orders")
}

impl<B: KeyValueBackend> OrderListCache<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Cached snapshot for this user, or `None` on miss, expiry, backend
    /// failure, or a corrupt entry.
    pub async fn get(&self, user_id: i64) -> Option<Vec<Order>> {
        let raw = match self.backend.get(&cache_key(user_id)).await {
            Ok(found) => found?,
            Err(err) => {
                warn!(user_id, error = %err, "order cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(orders) => Some(orders),
            Err(err) => {
                warn!(user_id, error = %err, "corrupt order cache entry, treating as miss");
                None
            }
        }
    }

    /// Best-effort write of the snapshot with the given TTL.
    pub async fn set(&self, user_id: i64, orders: &[Order], ttl_secs: u64) {
        let payload = match serde_json::to_string(orders) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(user_id, error = %err, "order list failed to serialize for caching");
                return;
            }
        };

        if let Err(err) = self.backend.set(&cache_key(user_id), &payload, ttl_secs).await {
            warn!(user_id, error = %err, "order cache write failed");
        }
    }

    pub async fn clear(&self, user_id: i64) {
        if let Err(err) = self.backend.delete(&cache_key(user_id)).await {
            warn!(user_id, error = %err, "order cache delete failed");
        }
    }
}
