use crate::application_impl::{RefreshCoordinator, SessionManager};
use crate::application_port::{
    AccessToken, AuthError, AuthService, AuthTokens, LoginInput, LoginResult, RefreshToken,
    TokenCodec,
};
use crate::domain_model::{Principal, RequestContext, SessionRecord, UserId};
use crate::domain_port::{IdentityGateway, SessionStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct RealAuthService {
    identity: Arc<dyn IdentityGateway>,
    token_codec: Arc<dyn TokenCodec>,
    sessions: SessionManager,
    coordinator: RefreshCoordinator,
}

impl RealAuthService {
    pub fn new(
        identity: Arc<dyn IdentityGateway>,
        token_codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn SessionStore>,
        max_sessions: usize,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            identity,
            token_codec,
            sessions: SessionManager::new(session_store.clone(), max_sessions),
            coordinator: RefreshCoordinator::new(session_store, lock_ttl),
        }
    }

    #[inline]
    fn new_jti() -> String {
        Uuid::new_v4().to_string()
    }

    /// Mints an access/refresh pair sharing one jti and registers the
    /// refresh session under it.
    async fn issue_session(
        &self,
        principal: &Principal,
        ctx: &RequestContext,
    ) -> Result<AuthTokens, AuthError> {
        let jti = Self::new_jti();

        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(principal, jti.clone())
            .await?;
        let (refresh_token, refresh_exp) = self
            .token_codec
            .issue_refresh_token(principal, jti.clone())
            .await?;

        let record = SessionRecord {
            token_id: jti,
            user_id: principal.id,
            username: principal.username.clone(),
            authorities: principal.authorities.clone(),
            created_at: Utc::now(),
            expires_at: refresh_exp,
            user_agent: ctx.user_agent.clone(),
            ip_address: ctx.ip_address.clone(),
        };
        // Store failure fails the whole call: no durable session, no tokens.
        self.sessions.store_session(&record).await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(
        &self,
        request: LoginInput,
        ctx: RequestContext,
    ) -> Result<LoginResult, AuthError> {
        let LoginInput { username, password } = request;

        let principal = self.identity.authenticate(&username, &password).await?;
        let tokens = self.issue_session(&principal, &ctx).await?;

        info!(user_id = %principal.id, "login succeeded");
        Ok(LoginResult {
            user_id: principal.id,
            tokens,
        })
    }

    async fn refresh(
        &self,
        refresh_token: &RefreshToken,
        ctx: RequestContext,
    ) -> Result<AuthTokens, AuthError> {
        // Stateless defects (signature, issuer, expiry) fail before any store
        // traffic.
        let verified = self.token_codec.verify_refresh_token(refresh_token).await?;

        // At most one concurrent caller gets the record back.
        let consumed = self.coordinator.consume(&verified.jti).await?;

        let tokens = self.issue_session(&consumed.principal(), &ctx).await?;
        debug!(user_id = %consumed.user_id, "refresh token rotated");
        Ok(tokens)
    }

    async fn logout(
        &self,
        access_token: &AccessToken,
        refresh_token: Option<&RefreshToken>,
    ) -> Result<(), AuthError> {
        match self.token_codec.verify_access_token(access_token).await {
            Ok(verified) => {
                // Pair shares a jti, so the access token alone identifies the
                // session to drop.
                self.sessions.revoke_session(&verified.jti).await?;
                self.sessions
                    .blacklist_access_token(&verified.jti, verified.expires_at)
                    .await?;
            }
            // Expired means nothing left to revoke or blacklist.
            Err(AuthError::TokenExpired) => {}
            Err(e) => return Err(e),
        }

        if let Some(rt) = refresh_token {
            match self.token_codec.verify_refresh_token(rt).await {
                Ok(verified) => self.sessions.revoke_session(&verified.jti).await?,
                Err(e) => {
                    // Logout stays effective even with a broken refresh token.
                    debug!(error = %e, "ignoring undecodable refresh token at logout");
                }
            }
        }
        Ok(())
    }

    async fn logout_all_devices(&self, user_id: UserId) -> Result<(), AuthError> {
        self.sessions.revoke_all_sessions(user_id).await?;
        warn!(%user_id, "all sessions revoked");
        Ok(())
    }

    async fn verify_token(&self, access_token: &AccessToken) -> Result<Principal, AuthError> {
        let verified = self.token_codec.verify_access_token(access_token).await?;
        if self.sessions.is_access_token_revoked(&verified.jti).await? {
            return Err(AuthError::TokenRevoked);
        }
        Ok(verified.principal)
    }
}
