use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection metadata attached to login/refresh calls.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Store record for one live refresh token, keyed by its jti.
/// Exists iff the token has not been consumed, revoked, or expired.
///
/// Username and authorities are carried so rotation can re-mint a token
/// pair without a round trip to the identity collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token_id: String,
    pub user_id: UserId,
    pub username: String,
    pub authorities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl SessionRecord {
    pub fn principal(&self) -> crate::domain_model::Principal {
        crate::domain_model::Principal {
            id: self.user_id,
            username: self.username.clone(),
            authorities: self.authorities.clone(),
        }
    }
}
