use crate::application_impl::keys;
use crate::application_port::AuthError;
use crate::domain_model::{SessionRecord, UserId};
use crate::domain_port::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Session registration, the per-user session cap, revocation, and the
/// access-token blacklist. Everything here is built from the store's
/// individually atomic primitives; a transient cap overshoot under
/// concurrent logins is acceptable and self-corrects on the next
/// registration.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    max_sessions: usize,
}

fn remaining_ttl(expires_at: DateTime<Utc>) -> Option<Duration> {
    let secs = (expires_at - Utc::now()).num_seconds();
    if secs <= 0 {
        None
    } else {
        Some(Duration::from_secs(secs as u64))
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, max_sessions: usize) -> Self {
        SessionManager {
            store,
            max_sessions,
        }
    }

    /// Registers a refresh-token session: cap enforcement, record write with
    /// TTL, membership in the owner's set. Never stores an already-expired
    /// session.
    pub async fn store_session(&self, record: &SessionRecord) -> Result<(), AuthError> {
        let Some(ttl) = remaining_ttl(record.expires_at) else {
            debug!(token_id = %record.token_id, "session already expired, not storing");
            return Ok(());
        };

        self.enforce_session_cap(record.user_id).await?;

        let value =
            serde_json::to_string(record).map_err(|e| AuthError::Internal(e.to_string()))?;
        let written = self
            .store
            .set_if_absent(&keys::session(&record.token_id), &value, ttl)
            .await?;
        if !written {
            return Err(AuthError::Internal(format!(
                "session id collision for {}",
                record.token_id
            )));
        }

        let set_key = keys::user_sessions(record.user_id);
        self.store.add_to_set(&set_key, &record.token_id).await?;
        // The newest session is the longest-lived member, so its TTL covers
        // the whole set.
        self.store.expire(&set_key, ttl).await?;
        Ok(())
    }

    /// Oldest-first eviction by `created_at` until the user is one below the
    /// cap. Set members without a readable record are stale and get pruned
    /// instead of counted.
    async fn enforce_session_cap(&self, user_id: UserId) -> Result<(), AuthError> {
        let set_key = keys::user_sessions(user_id);
        let count = self.store.size_of(&set_key).await?;
        if (count as usize) < self.max_sessions {
            return Ok(());
        }

        let members = self.store.members_of(&set_key).await?;
        let mut live: Vec<SessionRecord> = Vec::with_capacity(members.len());
        for token_id in members {
            match self.store.get(&keys::session(&token_id)).await? {
                Some(raw) => match serde_json::from_str::<SessionRecord>(&raw) {
                    Ok(record) => live.push(record),
                    Err(e) => {
                        warn!(%token_id, error = %e, "dropping unreadable session record");
                        self.evict(&set_key, &token_id).await?;
                    }
                },
                None => {
                    self.store.remove_from_set(&set_key, &token_id).await?;
                }
            }
        }

        live.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.token_id.cmp(&b.token_id))
        });

        let target = self.max_sessions.saturating_sub(1);
        let excess = live.len().saturating_sub(target);
        for record in live.iter().take(excess) {
            debug!(user_id = %user_id, token_id = %record.token_id, "evicting oldest session over cap");
            self.evict(&set_key, &record.token_id).await?;
        }
        Ok(())
    }

    async fn evict(&self, set_key: &str, token_id: &str) -> Result<(), AuthError> {
        self.store.delete(&[keys::session(token_id)]).await?;
        self.store.remove_from_set(set_key, token_id).await?;
        Ok(())
    }

    /// Idempotent: an unknown or already-gone token id is a no-op.
    pub async fn revoke_session(&self, token_id: &str) -> Result<(), AuthError> {
        let session_key = keys::session(token_id);
        let Some(raw) = self.store.get(&session_key).await? else {
            return Ok(());
        };

        self.store.delete(&[session_key]).await?;
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => {
                self.store
                    .remove_from_set(&keys::user_sessions(record.user_id), token_id)
                    .await?;
            }
            Err(e) => {
                // Record is gone either way; the owning set self-expires.
                warn!(%token_id, error = %e, "revoked session record was unreadable");
            }
        }
        Ok(())
    }

    /// Per-record deletion is best-effort; only the initial set lookup aborts
    /// the call.
    pub async fn revoke_all_sessions(&self, user_id: UserId) -> Result<(), AuthError> {
        let set_key = keys::user_sessions(user_id);
        let members = self.store.members_of(&set_key).await?;

        for token_id in &members {
            if let Err(e) = self.store.delete(&[keys::session(token_id)]).await {
                warn!(user_id = %user_id, %token_id, error = %e, "failed to delete session during revoke-all");
            }
        }
        self.store.delete(&[set_key]).await?;
        debug!(user_id = %user_id, sessions = members.len(), "revoked all sessions");
        Ok(())
    }

    /// Blacklist entry lives exactly as long as the token; nothing to do for
    /// an already-expired one.
    pub async fn blacklist_access_token(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some(ttl) = remaining_ttl(expires_at) else {
            return Ok(());
        };
        self.store
            .set_if_absent(&keys::revoked_access(jti), "1", ttl)
            .await?;
        Ok(())
    }

    pub async fn is_access_token_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(self.store.get(&keys::revoked_access(jti)).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemorySessionStore;

    fn record(user_id: UserId, token_id: &str, created_offset_secs: i64) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            token_id: token_id.to_string(),
            user_id,
            username: "alice".to_string(),
            authorities: vec!["ROLE_USER".to_string()],
            created_at: now + chrono::Duration::seconds(created_offset_secs),
            expires_at: now + chrono::Duration::hours(1),
            user_agent: None,
            ip_address: None,
        }
    }

    fn manager(max_sessions: usize) -> (SessionManager, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (SessionManager::new(store.clone(), max_sessions), store)
    }

    #[tokio::test]
    async fn stores_and_indexes_session() {
        let (mgr, store) = manager(5);
        let user = UserId(uuid::Uuid::new_v4());
        mgr.store_session(&record(user, "t1", 0)).await.unwrap();

        assert!(store.get(&keys::session("t1")).await.unwrap().is_some());
        let members = store.members_of(&keys::user_sessions(user)).await.unwrap();
        assert_eq!(members, vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn expired_session_is_not_stored() {
        let (mgr, store) = manager(5);
        let user = UserId(uuid::Uuid::new_v4());
        let mut r = record(user, "t1", 0);
        r.expires_at = Utc::now() - chrono::Duration::seconds(5);
        mgr.store_session(&r).await.unwrap();

        assert!(store.get(&keys::session("t1")).await.unwrap().is_none());
        assert_eq!(store.size_of(&keys::user_sessions(user)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cap_evicts_oldest_first() {
        let (mgr, store) = manager(3);
        let user = UserId(uuid::Uuid::new_v4());
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            mgr.store_session(&record(user, id, i as i64)).await.unwrap();
        }

        // Fourth session: "a" (oldest) must go, the rest stay.
        mgr.store_session(&record(user, "d", 3)).await.unwrap();

        assert!(store.get(&keys::session("a")).await.unwrap().is_none());
        for id in ["b", "c", "d"] {
            assert!(store.get(&keys::session(id)).await.unwrap().is_some());
        }
        assert_eq!(store.size_of(&keys::user_sessions(user)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cap_prunes_stale_set_members() {
        let (mgr, store) = manager(2);
        let user = UserId(uuid::Uuid::new_v4());
        mgr.store_session(&record(user, "a", 0)).await.unwrap();
        mgr.store_session(&record(user, "b", 1)).await.unwrap();

        // Simulate natural expiry of "a": record gone, set member left behind.
        store.delete(&[keys::session("a")]).await.unwrap();

        mgr.store_session(&record(user, "c", 2)).await.unwrap();
        let mut members = store.members_of(&keys::user_sessions(user)).await.unwrap();
        members.sort();
        assert_eq!(members, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn revoke_unknown_session_is_noop() {
        let (mgr, store) = manager(5);
        let user = UserId(uuid::Uuid::new_v4());
        mgr.store_session(&record(user, "t1", 0)).await.unwrap();

        mgr.revoke_session("no-such-token").await.unwrap();
        // Existing state untouched.
        assert!(store.get(&keys::session("t1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_all_clears_set_and_records() {
        let (mgr, store) = manager(5);
        let user = UserId(uuid::Uuid::new_v4());
        for id in ["a", "b", "c"] {
            mgr.store_session(&record(user, id, 0)).await.unwrap();
        }

        mgr.revoke_all_sessions(user).await.unwrap();
        for id in ["a", "b", "c"] {
            assert!(store.get(&keys::session(id)).await.unwrap().is_none());
        }
        assert_eq!(store.size_of(&keys::user_sessions(user)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blacklist_round_trip() {
        let (mgr, _) = manager(5);
        assert!(!mgr.is_access_token_revoked("jti-x").await.unwrap());
        mgr.blacklist_access_token("jti-x", Utc::now() + chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert!(mgr.is_access_token_revoked("jti-x").await.unwrap());
    }

    #[tokio::test]
    async fn blacklisting_expired_token_is_noop() {
        let (mgr, _) = manager(5);
        mgr.blacklist_access_token("jti-y", Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert!(!mgr.is_access_token_revoked("jti-y").await.unwrap());
    }
}
