//! Fail-soft session adapter over a key-value backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use parcelbot_core::UserSession;

use crate::KeyValueBackend;

/// Chat-user session records, one JSON document per user under
/// `user:{user_id}`.
///
/// Every operation degrades instead of failing: an unreachable backend
/// makes reads report "signed out" and turns writes into logged no-ops, so
/// the chat flow stays responsive and simply re-prompts for authentication.
pub struct Sessions<B> {
    backend: Arc<B>,
    ttl_secs: u64,
}

fn record_key(user_id: i64) -> String {
    format!("user:{user_id}")
}

impl<B: KeyValueBackend> Sessions<B> {
    pub fn new(backend: Arc<B>, ttl_secs: u64) -> Self {
        Self { backend, ttl_secs }
    }

    /// Current non-expired session record, if any.
    pub async fn session(&self, user_id: i64) -> Option<UserSession> {
        let raw = match self.backend.get(&record_key(user_id)).await {
            Ok(found) => found?,
            Err(err) => {
                warn!(user_id, error = %err, "session read failed, treating user as signed out");
                return None;
            }
        };

        match serde_json::from_str::<UserSession>(&raw) {
            Ok(record) if record.expires_at > Utc::now() => Some(record),
            Ok(_) => None,
            Err(err) => {
                warn!(user_id, error = %err, "corrupt session record, treating user as signed out");
                None
            }
        }
    }

    pub async fn is_authorized(&self, user_id: i64) -> bool {
        self.session(user_id)
            .await
            .map(|record| record.is_active(Utc::now()))
            .unwrap_or(false)
    }

    /// Upserts the authenticated binding and refreshes the TTL. Returns
    /// whether the record was actually persisted; callers treat `false` as
    /// a degraded store, not a failed authentication.
    pub async fn authorize(
        &self,
        user_id: i64,
        order_id: i64,
        code: Option<String>,
        phone: Option<String>,
    ) -> bool {
        let record = UserSession {
            user_id,
            order_id: Some(order_id),
            code,
            phone,
            authorized: true,
            expires_at: Utc::now() + Duration::seconds(self.ttl_secs as i64),
        };

        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(user_id, error = %err, "session record failed to serialize");
                return false;
            }
        };

        match self.backend.set(&record_key(user_id), &payload, self.ttl_secs).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user_id, error = %err, "session write failed, continuing without persistence");
                false
            }
        }
    }

    pub async fn clear(&self, user_id: i64) {
        if let Err(err) = self.backend.delete(&record_key(user_id)).await {
            warn!(user_id, error = %err, "session delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::{InMemoryBackend, KeyValueBackend, StoreError};

    use super::Sessions;

    struct UnreachableBackend;

    #[async_trait]
    impl KeyValueBackend for UnreachableBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn authorize_then_read_back() {
        let sessions = Sessions::new(Arc::new(InMemoryBackend::new()), 86_400);

        assert!(!sessions.is_authorized(100).await);
        assert!(sessions.authorize(100, 42, Some("7488".to_string()), None).await);
        assert!(sessions.is_authorized(100).await);

        let record = sessions.session(100).await.expect("record present");
        assert_eq!(record.order_id, Some(42));
        assert_eq!(record.code.as_deref(), Some("7488"));
    }

    #[tokio::test]
    async fn reauthentication_overwrites_the_binding() {
        let sessions = Sessions::new(Arc::new(InMemoryBackend::new()), 86_400);
        sessions.authorize(100, 42, Some("7488".to_string()), None).await;
        sessions.authorize(100, 77, None, Some("+79161234567".to_string())).await;

        let record = sessions.session(100).await.expect("record present");
        assert_eq!(record.order_id, Some(77));
        assert_eq!(record.code, None);
        assert_eq!(record.phone.as_deref(), Some("+79161234567"));
    }

    #[tokio::test]
    async fn clear_signs_the_user_out() {
        let sessions = Sessions::new(Arc::new(InMemoryBackend::new()), 86_400);
        sessions.authorize(100, 42, None, None).await;
        sessions.clear(100).await;
        assert!(!sessions.is_authorized(100).await);
    }

    #[tokio::test]
    async fn sessions_are_scoped_per_user() {
        let sessions = Sessions::new(Arc::new(InMemoryBackend::new()), 86_400);
        sessions.authorize(100, 42, None, None).await;
        assert!(!sessions.is_authorized(200).await);
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_instead_of_failing() {
        let sessions = Sessions::new(Arc::new(UnreachableBackend), 86_400);

        assert!(!sessions.is_authorized(100).await);
        assert_eq!(sessions.session(100).await, None);
        assert!(!sessions.authorize(100, 42, None, None).await);
        sessions.clear(100).await;
    }

    #[tokio::test]
    async fn expired_record_reads_as_signed_out() {
        // TTL of zero: the embedded expires_at is already in the past.
        let sessions = Sessions::new(Arc::new(InMemoryBackend::new()), 0);
        sessions.authorize(100, 42, None, None).await;
        assert!(!sessions.is_authorized(100).await);
    }
}
