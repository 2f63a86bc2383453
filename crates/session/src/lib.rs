//! Session store - durable chat-user bindings and the order-list cache.
//!
//! Both the session records and the short-TTL order-list snapshots live in
//! one external key-value store, reached through the [`KeyValueBackend`]
//! seam. Production uses [`RedisBackend`]; tests use [`InMemoryBackend`].
//!
//! Store outages must never take the chat flow down: the [`Sessions`] and
//! [`OrderListCache`] adapters log backend failures and degrade (reads act
//! as "signed out"/"cache miss", writes become best-effort).

use async_trait::async_trait;
use thiserror::Error;

pub mod cache;
pub mod memory;
pub mod redis;
pub mod sessions;

pub use cache::OrderListCache;
pub use memory::InMemoryBackend;
pub use redis::RedisBackend;
pub use sessions::Sessions;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store backend failure: {0}")]
    Backend(String),
}

/// Minimal key-value contract the session layer needs: get/set-with-TTL/
/// delete. Keys are namespaced by chat user id above this seam.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
