use crate::application_port::{
    AccessToken, AuthError, RefreshToken, TokenCodec, TokenVerifyResult,
};
use crate::domain_model::{Principal, UserId};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Tolerance applied to exp/iat validation.
    pub clock_skew: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String, // username
    iss: String,
    iat: i64,
    exp: i64,
    jti: String,
    uid: String, // user id
    scope: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
    jti: String, // session key in the store
    uid: String,
}

fn encode_access(
    principal: &Principal,
    jti: String,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.access_ttl;
    let claims = AccessClaims {
        sub: principal.username.clone(),
        iss: cfg.issuer.clone(),
        iat: iat_dt.timestamp(),
        exp: exp_dt.timestamp(),
        jti,
        uid: principal.id.to_string(),
        scope: principal.scope(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok((token, exp_dt))
}

fn encode_refresh(
    principal: &Principal,
    jti: String,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.refresh_ttl;
    let claims = RefreshClaims {
        sub: principal.username.clone(),
        iss: cfg.issuer.clone(),
        iat: iat_dt.timestamp(),
        exp: exp_dt.timestamp(),
        jti,
        uid: principal.id.to_string(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok((token, exp_dt))
}

fn validation(cfg: &JwtConfig) -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    v.leeway = cfg.clock_skew.as_secs();
    v.set_issuer(&[cfg.issuer.clone()]);
    v
}

fn decode_access(token: &str, cfg: &JwtConfig) -> Result<AccessClaims, AuthError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(&cfg.signing_key),
        &validation(cfg),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    })?;
    Ok(data.claims)
}

fn decode_refresh(token: &str, cfg: &JwtConfig) -> Result<RefreshClaims, AuthError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(&cfg.signing_key),
        &validation(cfg),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    })?;
    Ok(data.claims)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    fn parse_user_id(uid: &str) -> Result<UserId, AuthError> {
        uid.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)
    }

    fn exp_datetime(exp: i64) -> Result<DateTime<Utc>, AuthError> {
        Utc.timestamp_opt(exp, 0)
            .single()
            .ok_or(AuthError::TokenInvalid)
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        principal: &Principal,
        jti: String,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_access(principal, jti, &self.cfg)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        principal: &Principal,
        jti: String,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_refresh(principal, jti, &self.cfg)?;
        Ok((RefreshToken(token), exp_dt))
    }

    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<TokenVerifyResult, AuthError> {
        let claims = decode_access(&token.0, &self.cfg)?;
        let user_id = Self::parse_user_id(&claims.uid)?;
        Ok(TokenVerifyResult {
            principal: Principal {
                id: user_id,
                username: claims.sub,
                authorities: if claims.scope.is_empty() {
                    Vec::new()
                } else {
                    claims.scope.split(' ').map(str::to_string).collect()
                },
            },
            jti: claims.jti,
            expires_at: Self::exp_datetime(claims.exp)?,
        })
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenVerifyResult, AuthError> {
        let claims = decode_refresh(&token.0, &self.cfg)?;
        let user_id = Self::parse_user_id(&claims.uid)?;
        Ok(TokenVerifyResult {
            principal: Principal {
                id: user_id,
                username: claims.sub,
                authorities: Vec::new(),
            },
            jti: claims.jti,
            expires_at: Self::exp_datetime(claims.exp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg() -> JwtConfig {
        JwtConfig {
            issuer: "gatehouse-test".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(3600),
            clock_skew: Duration::from_secs(30),
            signing_key: b"test-signing-secret".to_vec(),
        }
    }

    fn principal() -> Principal {
        Principal {
            id: UserId(uuid::Uuid::new_v4()),
            username: "alice".to_string(),
            authorities: vec!["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()],
        }
    }

    #[tokio::test]
    async fn access_token_round_trip() {
        let codec = JwtHs256Codec::new(test_cfg());
        let p = principal();
        let (token, exp) = codec
            .issue_access_token(&p, "jti-1".to_string())
            .await
            .unwrap();

        let verified = codec.verify_access_token(&token).await.unwrap();
        assert_eq!(verified.principal.username, p.username);
        assert_eq!(verified.principal.id, p.id);
        assert_eq!(verified.principal.authorities, p.authorities);
        assert_eq!(verified.jti, "jti-1");
        assert_eq!(verified.expires_at.timestamp(), exp.timestamp());
    }

    #[tokio::test]
    async fn refresh_token_round_trip() {
        let codec = JwtHs256Codec::new(test_cfg());
        let p = principal();
        let (token, _) = codec
            .issue_refresh_token(&p, "jti-2".to_string())
            .await
            .unwrap();

        let verified = codec.verify_refresh_token(&token).await.unwrap();
        assert_eq!(verified.principal.id, p.id);
        assert_eq!(verified.jti, "jti-2");
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let codec = JwtHs256Codec::new(test_cfg());
        let mut other_cfg = test_cfg();
        other_cfg.signing_key = b"a-different-secret".to_vec();
        let other = JwtHs256Codec::new(other_cfg);

        let (token, _) = codec
            .issue_access_token(&principal(), "jti".to_string())
            .await
            .unwrap();
        let err = other.verify_access_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn wrong_issuer_is_invalid() {
        let codec = JwtHs256Codec::new(test_cfg());
        let mut other_cfg = test_cfg();
        other_cfg.issuer = "someone-else".to_string();
        let other = JwtHs256Codec::new(other_cfg);

        let (token, _) = codec
            .issue_access_token(&principal(), "jti".to_string())
            .await
            .unwrap();
        let err = other.verify_access_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn expired_token_is_distinguished() {
        let mut cfg = test_cfg();
        // Expired well past the leeway window.
        cfg.access_ttl = Duration::ZERO;
        cfg.clock_skew = Duration::ZERO;
        let codec = JwtHs256Codec::new(cfg);

        let (token, _) = codec
            .issue_access_token(&principal(), "jti".to_string())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let err = codec.verify_access_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn garbage_is_invalid() {
        let codec = JwtHs256Codec::new(test_cfg());
        let err = codec
            .verify_access_token(&AccessToken("not-a-jwt".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }
}
