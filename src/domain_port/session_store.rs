use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Unavailable(String),
}

impl From<StoreError> for crate::application_port::AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => {
                crate::application_port::AuthError::StoreUnavailable(msg)
            }
        }
    }
}

/// Shared TTL-aware key-value store holding session records, per-user
/// session-id sets, the access-token blacklist, and rotation locks.
///
/// Each primitive is atomic on its own; nothing here spans keys. Correctness
/// across multiple calls is the refresh coordinator's job, not the store's.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Atomic set-if-absent with TTL. Returns true iff the key was written.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;
    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn members_of(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn size_of(&self, key: &str) -> Result<u64, StoreError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}
