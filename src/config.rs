//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::CacheSettings;
use crate::error::{ProxyError, Result};

/// Highest Redis database index accepted for `REDIS_DB`.
pub const MAX_REDIS_DB: u8 = 15;

/// Proxy configuration parameters.
///
/// Everything except the upstream host has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream authority every request is forwarded to (e.g. `example.com`)
    pub host: String,
    /// Host name redirects are localized to
    pub dev_host: String,
    /// Local plain HTTP port
    pub port: u16,
    /// Local HTTPS port advertised in localized `https` redirects
    pub ssl_port: u16,
    /// Use the Redis backend instead of the in-process table
    pub use_db_caching: bool,
    /// Redis connection URL
    pub redis_url: String,
    /// Optional Redis database index (0-15)
    pub redis_db: Option<u8>,
    /// Cache admission and expiry limits
    pub cache: CacheSettings,
    /// Sweep interval in seconds
    pub gc_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `UPSTREAM_HOST` - Upstream authority (required)
    /// - `DEV_HOST` - Local host used in redirects (default: localhost)
    /// - `PORT` - HTTP port (default: 8080)
    /// - `SSL_PORT` - HTTPS port (default: 8443)
    /// - `USE_DB_CACHING` - Store entries in Redis (default: false)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1/)
    /// - `REDIS_DB` - Redis database index 0-15 (default: unset)
    /// - `CACHE_DURATION_MS` - Entry lifetime (default: 60000)
    /// - `CACHE_SIZE_BYTES` - Largest cacheable body (default: 50000)
    /// - `CACHE_SIZE_ELEMENTS` - Maximum entry count (default: 50)
    /// - `GC_INTERVAL_SECS` - Sweep frequency (default: 60)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env::var("UPSTREAM_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ProxyError::Config("UPSTREAM_HOST is required".to_string()))?;

        let redis_db = match env::var("REDIS_DB") {
            Ok(raw) => Some(parse_redis_db(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            host,
            dev_host: env::var("DEV_HOST").unwrap_or(defaults.dev_host),
            port: env_or("PORT", defaults.port),
            ssl_port: env_or("SSL_PORT", defaults.ssl_port),
            use_db_caching: env::var("USE_DB_CACHING")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.use_db_caching),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_db,
            cache: CacheSettings::new(
                env_or("CACHE_DURATION_MS", 0),
                env_or("CACHE_SIZE_BYTES", 0),
                env_or("CACHE_SIZE_ELEMENTS", 0),
            ),
            gc_interval: env_or("GC_INTERVAL_SECS", defaults.gc_interval).max(1),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            dev_host: "localhost".to_string(),
            port: 8080,
            ssl_port: 8443,
            use_db_caching: false,
            redis_url: "redis://127.0.0.1/".to_string(),
            redis_db: None,
            cache: CacheSettings::default(),
            gc_interval: 60,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_redis_db(raw: &str) -> Result<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|db| *db <= MAX_REDIS_DB)
        .ok_or_else(|| {
            ProxyError::Config(format!(
                "REDIS_DB must be between 0 and {}, got {:?}",
                MAX_REDIS_DB, raw
            ))
        })
}
