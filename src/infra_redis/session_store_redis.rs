use crate::domain_port::{SessionStore, StoreError};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Redis-backed session store. Every trait primitive maps to one Redis
/// command, so the store-side atomicity guarantees are Redis's own.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn map_err(e: redis::RedisError) -> StoreError {
        StoreError::Unavailable(e.to_string())
    }

    // Redis EX rejects 0.
    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        // SET key value EX ttl NX; nil reply means the key already existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(self.key(key)).await.map_err(Self::map_err)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let prefixed: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let _: () = conn.del(prefixed).await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .sadd(self.key(key), member)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .srem(self.key(key), member)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn members_of(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(self.key(key)).await.map_err(Self::map_err)
    }

    async fn size_of(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        conn.scard(self.key(key)).await.map_err(Self::map_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .expire(self.key(key), Self::ttl_secs(ttl) as i64)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
