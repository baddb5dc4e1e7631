use crate::domain_port::{SessionStore, StoreError};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, Entry};
use std::collections::HashSet;
use std::time::Duration;

struct ValueCell {
    value: String,
    expires_at: DateTime<Utc>,
}

struct SetCell {
    members: HashSet<String>,
    // None until `expire` is called on the set key.
    expires_at: Option<DateTime<Utc>>,
}

/// Single-process session store with lazy expiry. Backend for tests and
/// demos; deployments use the Redis adapter.
#[derive(Default)]
pub struct MemorySessionStore {
    values: DashMap<String, ValueCell>,
    sets: DashMap<String, SetCell>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn set_expired(cell: &SetCell, now: DateTime<Utc>) -> bool {
    matches!(cell.expires_at, Some(exp) if exp <= now)
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let cell = ValueCell {
            value: value.to_string(),
            expires_at: now + ttl,
        };
        match self.values.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.insert(cell);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(cell);
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Utc::now();
        let expired = match self.values.get(key) {
            Some(cell) if cell.expires_at > now => return Ok(Some(cell.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.values.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.values.remove(key);
            self.sets.remove(key);
        }
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        match self.sets.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let cell = occupied.get_mut();
                if set_expired(cell, now) {
                    cell.members.clear();
                    cell.expires_at = None;
                }
                cell.members.insert(member.to_string());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SetCell {
                    members: HashSet::from([member.to_string()]),
                    expires_at: None,
                });
            }
        }
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut drop_key = false;
        if let Some(mut cell) = self.sets.get_mut(key) {
            if set_expired(&cell, now) {
                drop_key = true;
            } else {
                cell.members.remove(member);
                drop_key = cell.members.is_empty();
            }
        }
        if drop_key {
            self.sets.remove(key);
        }
        Ok(())
    }

    async fn members_of(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let now = Utc::now();
        let expired = match self.sets.get(key) {
            Some(cell) if !set_expired(&cell, now) => {
                return Ok(cell.members.iter().cloned().collect());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sets.remove(key);
        }
        Ok(Vec::new())
    }

    async fn size_of(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.members_of(key).await?.len() as u64)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let deadline = Utc::now() + ttl;
        if let Some(mut cell) = self.values.get_mut(key) {
            cell.expires_at = deadline;
            return Ok(());
        }
        if let Some(mut cell) = self.sets.get_mut(key) {
            cell.expires_at = Some(deadline);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_is_exclusive() {
        let store = MemorySessionStore::new();
        assert!(
            store
                .set_if_absent("k", "first", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert!(
            !store
                .set_if_absent("k", "second", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn value_expires_after_ttl() {
        let store = MemorySessionStore::new();
        store
            .set_if_absent("k", "v", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.get("k").await.unwrap().is_none());
        // And the slot is free again.
        assert!(
            store
                .set_if_absent("k", "v2", Duration::from_secs(60))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn set_membership_round_trip() {
        let store = MemorySessionStore::new();
        store.add_to_set("s", "a").await.unwrap();
        store.add_to_set("s", "b").await.unwrap();
        store.add_to_set("s", "b").await.unwrap();

        assert_eq!(store.size_of("s").await.unwrap(), 2);
        store.remove_from_set("s", "a").await.unwrap();
        assert_eq!(store.members_of("s").await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn expired_set_reads_empty() {
        let store = MemorySessionStore::new();
        store.add_to_set("s", "a").await.unwrap();
        store.expire("s", Duration::from_secs(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.size_of("s").await.unwrap(), 0);
        assert!(store.members_of("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_clears_both_namespaces() {
        let store = MemorySessionStore::new();
        store
            .set_if_absent("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        store.add_to_set("k2", "m").await.unwrap();

        store
            .delete(&["k".to_string(), "k2".to_string()])
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.size_of("k2").await.unwrap(), 0);
    }
}
