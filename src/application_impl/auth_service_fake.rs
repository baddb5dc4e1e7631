use crate::application_port::*;
use crate::domain_model::{Principal, RequestContext, UserId};
use chrono::{Duration, Utc};

#[derive(Debug)]
pub struct FakeAuthService;

impl FakeAuthService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FakeAuthService {
    fn default() -> Self {
        Self::new()
    }
}

// Minimal fake implementation for basic use only.
// Extend to simulate more error cases and configurable responses when needed.
#[async_trait::async_trait]
impl AuthService for FakeAuthService {
    async fn login(
        &self,
        request: LoginInput,
        _ctx: RequestContext,
    ) -> Result<LoginResult, AuthError> {
        Ok(LoginResult {
            user_id: get_fake_id(&request.username),
            tokens: get_fake_tokens(&request.username),
        })
    }

    async fn refresh(
        &self,
        refresh_token: &RefreshToken,
        _ctx: RequestContext,
    ) -> Result<AuthTokens, AuthError> {
        if let Some(username) = refresh_token.0.strip_prefix("fake-refresh-token:") {
            Ok(get_fake_tokens(username))
        } else {
            Err(AuthError::TokenInvalid)
        }
    }

    async fn logout(
        &self,
        access_token: &AccessToken,
        _refresh_token: Option<&RefreshToken>,
    ) -> Result<(), AuthError> {
        if access_token.0.starts_with("fake-access-token:") {
            Ok(())
        } else {
            Err(AuthError::TokenInvalid)
        }
    }

    async fn logout_all_devices(&self, _user_id: UserId) -> Result<(), AuthError> {
        Ok(())
    }

    async fn verify_token(&self, access_token: &AccessToken) -> Result<Principal, AuthError> {
        if let Some(username) = access_token.0.strip_prefix("fake-access-token:") {
            Ok(Principal {
                id: get_fake_id(username),
                username: username.to_string(),
                authorities: vec![],
            })
        } else {
            Err(AuthError::TokenInvalid)
        }
    }
}

fn get_fake_id(username: &str) -> UserId {
    UserId(uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_OID,
        username.as_bytes(),
    ))
}

fn get_fake_tokens(username: &str) -> AuthTokens {
    let now = Utc::now();
    AuthTokens {
        access_token: AccessToken(format!("fake-access-token:{}", username)),
        access_token_expires_at: now + Duration::days(1),
        refresh_token: RefreshToken(format!("fake-refresh-token:{}", username)),
        refresh_token_expires_at: now + Duration::days(7),
    }
}
