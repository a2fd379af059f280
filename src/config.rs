use std::env;

use anyhow::Context;
use secrecy::SecretString;

use crate::shipping::GhnConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub redis_url: Option<String>,
    pub shipping_cache_ttl_secs: u64,
    pub session_secure: bool,
    pub ghn: GhnConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        let shipping_cache_ttl_secs = env::var("SHIPPING_CACHE_TTL_SECS")
            .ok()
            .and_then(|ttl| ttl.parse::<u64>().ok())
            .unwrap_or(24 * 60 * 60);
        let session_secure = env::var("SESSION_SECURE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(Self {
            port,
            database_url,
            host,
            redis_url,
            shipping_cache_ttl_secs,
            session_secure,
            ghn: GhnConfig::from_env()?,
        })
    }
}

impl GhnConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = env::var("GHN_END_POINT").context("GHN_END_POINT must be set")?;
        let token = env::var("GHN_TOKEN_API").context("GHN_TOKEN_API must be set")?;
        let shop_id = env::var("GHN_SHOP_ID").context("GHN_SHOP_ID must be set")?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: SecretString::from(token),
            shop_id,
        })
    }
}
