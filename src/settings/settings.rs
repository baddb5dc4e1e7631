use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub session_store: SessionStoreSettings,
    pub log: Log,
}

/// Token/session tunables. Nothing here is hardcoded in the library; the
/// signing secret in particular always arrives from deployment config.
#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub signing_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub lock_ttl_secs: u64,
    pub max_sessions: usize,
    pub clock_skew_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SessionStoreSettings {
    pub backend: String, // "memory" or "redis"
    pub redis_url: String,
    pub key_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
