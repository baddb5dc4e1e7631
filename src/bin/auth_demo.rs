/// Example demonstrating the full credential lifecycle against a running
/// store: login, at-most-once refresh rotation, replay rejection, and
/// multi-device logout.
///
/// Runs against the in-memory backend by default; point
/// `session_store.backend` at "redis" in the settings file to exercise the
/// Redis adapter instead.
use gatehouse::application_impl::{JwtConfig, JwtHs256Codec, RealAuthService, StaticIdentityGateway};
use gatehouse::application_port::{AuthError, AuthService, LoginInput};
use gatehouse::domain_model::{Principal, RequestContext, UserId};
use gatehouse::domain_port::SessionStore;
use gatehouse::infra_memory::MemorySessionStore;
use gatehouse::infra_redis::RedisSessionStore;
use gatehouse::logger::*;
use gatehouse::settings::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();
    let settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_settings(&settings.log)?;

    let store: Arc<dyn SessionStore> = match settings.session_store.backend.as_str() {
        "redis" => {
            let client = redis::Client::open(settings.session_store.redis_url.as_str())?;
            let conn = redis::aio::ConnectionManager::new(client).await?;
            Arc::new(RedisSessionStore::new(
                conn,
                settings.session_store.key_prefix.clone(),
            ))
        }
        _ => Arc::new(MemorySessionStore::new()),
    };

    let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
        issuer: settings.auth.issuer.clone(),
        access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
        refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
        clock_skew: Duration::from_secs(settings.auth.clock_skew_secs),
        signing_key: settings.auth.signing_secret.clone().into_bytes(),
    }));

    let demo_user = Principal {
        id: UserId(uuid::Uuid::new_v4()),
        username: "demo".to_string(),
        authorities: vec!["ROLE_USER".to_string()],
    };
    let identity = Arc::new(StaticIdentityGateway::new().with_user("demo-pass", demo_user.clone()));

    let auth = RealAuthService::new(
        identity,
        codec,
        store,
        settings.auth.max_sessions,
        Duration::from_secs(settings.auth.lock_ttl_secs),
    );

    let ctx = RequestContext {
        user_agent: Some("auth_demo/0.1".to_string()),
        ip_address: Some("127.0.0.1".to_string()),
    };

    let login = auth
        .login(
            LoginInput {
                username: "demo".to_string(),
                password: "demo-pass".to_string(),
            },
            ctx.clone(),
        )
        .await?;
    info!(user_id = %login.user_id, "logged in");

    let rotated = auth.refresh(&login.tokens.refresh_token, ctx.clone()).await?;
    info!("refresh token rotated");

    match auth.refresh(&login.tokens.refresh_token, ctx.clone()).await {
        Err(AuthError::RefreshReused) => info!("replayed refresh token rejected as expected"),
        other => error!(?other, "replay was not rejected"),
    }

    let verified = auth.verify_token(&rotated.access_token).await?;
    info!(user = %verified.username, scope = %verified.scope(), "access token verified");

    auth.logout_all_devices(demo_user.id).await?;
    match auth.refresh(&rotated.refresh_token, ctx).await {
        Err(AuthError::RefreshReused) => info!("post-logout refresh rejected as expected"),
        other => error!(?other, "post-logout refresh was not rejected"),
    }

    Ok(())
}
