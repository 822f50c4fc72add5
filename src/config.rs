use std::time::Duration;
use thiserror::Error;

use crate::cache::{CacheConfig, parse_duration_secs};
use crate::rate_limit::RateLimitConfig;
use crate::validation::upload::UploadPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process configuration, read once at startup from the environment
/// (optionally seeded from `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// When set, tokens are verified with HS256 instead of the JWKS.
    pub jwt_secret: Option<String>,
    pub redis_url: Option<String>,
    pub port: u16,
    pub run_migrations: bool,
    pub db_connect_timeout: Duration,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub upload: UploadPolicy,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag(key: &str) -> bool {
    matches!(
        optional(key).as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url = required("SUPABASE_URL")?;
        if !supabase_url.starts_with("https://") && !supabase_url.starts_with("http://") {
            return Err(ConfigError::Invalid {
                key: "SUPABASE_URL",
                value: supabase_url,
            });
        }

        let port = match optional("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => 8080,
        };

        let rate_limit = RateLimitConfig::from_env();
        let redis_url = optional("REDIS_URL");
        if rate_limit.use_redis && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            supabase_url,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            jwt_secret: optional("SUPABASE_JWT_SECRET"),
            redis_url,
            port,
            run_migrations: flag("RUN_MIGRATIONS"),
            db_connect_timeout: parse_duration_secs("DB_CONNECT_TIMEOUT_SECS", 10),
            cache: CacheConfig::from_env(),
            rate_limit,
            upload: UploadPolicy::from_env(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
