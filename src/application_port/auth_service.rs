use crate::domain_model::{Principal, RequestContext, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token revoked")]
    TokenRevoked,
    /// No session exists for the presented refresh token: already rotated,
    /// revoked, or expired. Terminal; possible replay.
    #[error("refresh token already used or unknown")]
    RefreshReused,
    /// A rotation for the same token id is already in flight. Transient;
    /// the caller may retry after backoff, the service never retries itself.
    #[error("concurrent refresh in progress")]
    ConcurrentRefresh,
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Outcome of a stateless token verification.
#[derive(Debug, Clone)]
pub struct TokenVerifyResult {
    pub principal: Principal,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(
        &self,
        principal: &Principal,
        jti: String,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    async fn issue_refresh_token(
        &self,
        principal: &Principal,
        jti: String,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;
    /// Signature, issuer and expiry (with leeway) only; revocation status
    /// is checked against the store by the auth service.
    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<TokenVerifyResult, AuthError>;
    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenVerifyResult, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(
        &self,
        request: LoginInput,
        ctx: RequestContext,
    ) -> Result<LoginResult, AuthError>;
    /// Rotates the presented refresh token exactly once; a second call with
    /// the same token fails with `RefreshReused`.
    async fn refresh(
        &self,
        refresh_token: &RefreshToken,
        ctx: RequestContext,
    ) -> Result<AuthTokens, AuthError>;
    async fn logout(
        &self,
        access_token: &AccessToken,
        refresh_token: Option<&RefreshToken>,
    ) -> Result<(), AuthError>;
    async fn logout_all_devices(&self, user_id: UserId) -> Result<(), AuthError>;
    async fn verify_token(&self, access_token: &AccessToken) -> Result<Principal, AuthError>;
}
