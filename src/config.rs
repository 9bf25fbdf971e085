//! Configuration Module
//!
//! Loads cache and store settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for the cache timeout; the cache must never add more than a
/// sub-second constant to a request.
pub const MAX_CACHE_TIMEOUT_MS: u64 = 999;

/// Runtime configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,
    /// Postgres connection URL, if a relational store is wired in
    pub database_url: Option<String>,
    /// Per-operation cache timeout in milliseconds (1..=999)
    pub cache_timeout_ms: u64,
    /// Capacity of the in-memory backend
    pub max_entries: usize,
    /// In-memory expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Like toggles allowed per identity per window
    pub like_rate_limit: u32,
    /// Like rate window in seconds
    pub like_rate_window: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `DATABASE_URL` - Postgres URL (default: unset)
    /// - `CACHE_TIMEOUT_MS` - Cache operation timeout (default: 250, clamped to 1..=999)
    /// - `MAX_ENTRIES` - In-memory backend capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 30)
    /// - `LIKE_RATE_LIMIT` - Like toggles per window (default: 10)
    /// - `LIKE_RATE_WINDOW` - Window length in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            cache_timeout_ms: parse_env("CACHE_TIMEOUT_MS")
                .unwrap_or(defaults.cache_timeout_ms)
                .clamp(1, MAX_CACHE_TIMEOUT_MS),
            max_entries: parse_env("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: parse_env("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            like_rate_limit: parse_env("LIKE_RATE_LIMIT").unwrap_or(defaults.like_rate_limit),
            like_rate_window: parse_env("LIKE_RATE_WINDOW").unwrap_or(defaults.like_rate_window),
        }
    }

    /// Cache timeout as a Duration.
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms.clamp(1, MAX_CACHE_TIMEOUT_MS))
    }

    /// Like rate window, at least one second.
    pub fn like_rate_window(&self) -> Duration {
        Duration::from_secs(self.like_rate_window.max(1))
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            database_url: None,
            cache_timeout_ms: 250,
            max_entries: 10_000,
            cleanup_interval: 30,
            like_rate_limit: 10,
            like_rate_window: 60,
        }
    }
}
