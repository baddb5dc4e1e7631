use crate::application_impl::keys;
use crate::application_port::AuthError;
use crate::domain_model::SessionRecord;
use crate::domain_port::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Consumes a refresh-token session at most once per token id, no matter how
/// many callers present the same token concurrently.
///
/// The store only guarantees per-call atomicity, so the two-step
/// read-then-delete is fenced by a short-lived `set_if_absent` lock on the
/// token id. The lock is a single non-blocking attempt and self-expires after
/// `lock_ttl`, which bounds staleness if a holder dies mid-rotation.
pub struct RefreshCoordinator {
    store: Arc<dyn SessionStore>,
    lock_ttl: Duration,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn SessionStore>, lock_ttl: Duration) -> Self {
        RefreshCoordinator { store, lock_ttl }
    }

    /// Exactly one caller gets the `SessionRecord` back for a given token id;
    /// every concurrent other fails with `ConcurrentRefresh` (lock held) or
    /// `RefreshReused` (session already consumed).
    pub async fn consume(&self, token_id: &str) -> Result<SessionRecord, AuthError> {
        let lock_key = keys::refresh_lock(token_id);
        let marker = nanoid::nanoid!();
        let acquired = self
            .store
            .set_if_absent(&lock_key, &marker, self.lock_ttl)
            .await?;
        if !acquired {
            debug!(%token_id, "refresh already in flight for this token");
            return Err(AuthError::ConcurrentRefresh);
        }

        let outcome = self.consume_under_lock(token_id).await;

        // Runs no matter how the critical section ended; if this process dies
        // first, the lock TTL takes over.
        if let Err(e) = self.store.delete(&[lock_key]).await {
            warn!(%token_id, error = %e, "failed to release refresh lock, waiting for TTL expiry");
        }

        outcome
    }

    async fn consume_under_lock(&self, token_id: &str) -> Result<SessionRecord, AuthError> {
        let session_key = keys::session(token_id);
        let Some(raw) = self.store.get(&session_key).await? else {
            warn!(%token_id, "no session for presented refresh token, possible replay");
            return Err(AuthError::RefreshReused);
        };
        let record: SessionRecord =
            serde_json::from_str(&raw).map_err(|e| AuthError::Internal(e.to_string()))?;

        // Invalidate before anything else so the old token's exposure window
        // is the lock's own duration.
        self.store.delete(&[session_key]).await?;
        self.store
            .remove_from_set(&keys::user_sessions(record.user_id), token_id)
            .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::UserId;
    use crate::infra_memory::MemorySessionStore;
    use chrono::Utc;

    fn setup() -> (RefreshCoordinator, Arc<MemorySessionStore>, UserId) {
        let store = Arc::new(MemorySessionStore::new());
        let user = UserId(uuid::Uuid::new_v4());
        let coordinator = RefreshCoordinator::new(store.clone(), Duration::from_secs(10));
        (coordinator, store, user)
    }

    async fn seed(store: &MemorySessionStore, token_id: &str, user: UserId) {
        let record = SessionRecord {
            token_id: token_id.to_string(),
            user_id: user,
            username: "alice".to_string(),
            authorities: vec![],
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            user_agent: None,
            ip_address: None,
        };
        store
            .set_if_absent(
                &keys::session(token_id),
                &serde_json::to_string(&record).unwrap(),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        store
            .add_to_set(&keys::user_sessions(user), token_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_consume_wins_second_fails() {
        let (coordinator, store, user) = setup();
        seed(&store, "t1", user).await;

        let record = coordinator.consume("t1").await.unwrap();
        assert_eq!(record.user_id, user);

        let err = coordinator.consume("t1").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshReused));
    }

    #[tokio::test]
    async fn consume_removes_session_and_set_membership() {
        let (coordinator, store, user) = setup();
        seed(&store, "t1", user).await;

        coordinator.consume("t1").await.unwrap();
        assert!(store.get(&keys::session("t1")).await.unwrap().is_none());
        assert!(
            store
                .members_of(&keys::user_sessions(user))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn held_lock_yields_concurrent_refresh() {
        let (coordinator, store, user) = setup();
        seed(&store, "t1", user).await;

        // Someone else's rotation is in flight.
        store
            .set_if_absent(&keys::refresh_lock("t1"), "other", Duration::from_secs(10))
            .await
            .unwrap();

        let err = coordinator.consume("t1").await.unwrap_err();
        assert!(matches!(err, AuthError::ConcurrentRefresh));
        // Session untouched.
        assert!(store.get(&keys::session("t1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_is_released_after_failed_consume() {
        let (coordinator, store, _) = setup();
        let _ = store;

        let err = coordinator.consume("t-none").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshReused));
        // Lock was released, so a second attempt hits the same terminal
        // error rather than ConcurrentRefresh.
        let err = coordinator.consume("t-none").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshReused));
    }
}
