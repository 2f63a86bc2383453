//! Per-user single-flight locking.
//!
//! The chat transport delivers a user's updates in order, but a double-tap
//! can still put two handlers for the same user in flight at once. Holding
//! the user's lock across `authenticate` and `submit_review` keeps their
//! session and CRM writes from interleaving. Different users never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires this user's lock, creating it on first use. The guard is
    /// owned so it can be held across await points.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            Arc::clone(locks.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }
}
