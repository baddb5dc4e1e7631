//! Logical key layout inside the session store. Physical prefixing
//! (per-deployment namespace) is the store adapter's concern.

use crate::domain_model::UserId;

pub(crate) fn session(token_id: &str) -> String {
    format!("session:{token_id}")
}

pub(crate) fn user_sessions(user_id: UserId) -> String {
    format!("user_sessions:{user_id}")
}

pub(crate) fn refresh_lock(token_id: &str) -> String {
    format!("lock:refresh:{token_id}")
}

pub(crate) fn revoked_access(jti: &str) -> String {
    format!("revoked_access:{jti}")
}
