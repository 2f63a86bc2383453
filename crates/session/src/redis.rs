//! Redis-backed [`KeyValueBackend`].

use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};

use crate::{KeyValueBackend, StoreError};

/// Production backend. The connection manager reconnects on its own, so a
/// Redis hiccup shows up as per-operation errors rather than a dead handle;
/// the adapters above this treat those errors as degraded-store conditions.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

fn backend_error(err: ::redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(backend_error)?;
        let manager = client.get_connection_manager().await.map_err(backend_error)?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(backend_error)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await.map_err(backend_error)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await.map_err(backend_error)
    }
}
