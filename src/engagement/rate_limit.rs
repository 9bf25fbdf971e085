//! Per-identity like throttling.
//!
//! A fixed window counter kept in the cache store. When the cache is
//! unreachable every request is admitted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{bounded, CacheBackend, CacheKey, Namespace};
use crate::config::Config;
use crate::engagement::identity::ClientIdentity;
use crate::error::EngagementError;

#[derive(Clone)]
pub struct LikeRateLimiter {
    backend: Arc<dyn CacheBackend>,
    limit: u32,
    window: Duration,
    timeout: Duration,
}

impl LikeRateLimiter {
    /// `limit` mutations per identity per `window`, 250ms cache timeout.
    pub fn new(backend: Arc<dyn CacheBackend>, limit: u32, window: Duration) -> Self {
        Self {
            backend,
            limit,
            window,
            timeout: Duration::from_millis(250),
        }
    }

    /// Limit, window and cache timeout taken from `config`.
    pub fn from_config(backend: Arc<dyn CacheBackend>, config: &Config) -> Self {
        Self::new(backend, config.like_rate_limit, config.like_rate_window())
            .with_timeout(config.cache_timeout())
    }

    /// Bound on the counter round trip; past it the request is admitted.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mutations allowed per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Window length, also reported as `retry_after`.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counter key of `identity`, in the `ratelimit.like` namespace.
    pub fn key_for(identity: &ClientIdentity) -> CacheKey {
        CacheKey::builder(Namespace::RateLimitLike)
            .param("identity", Some(identity.as_str()))
            .build()
    }

    /// Counts one like mutation for `identity`.
    ///
    /// Returns `RateLimited` once the identity exceeds `limit` mutations in
    /// the current window.
    pub async fn check(&self, identity: &ClientIdentity) -> Result<(), EngagementError> {
        let key = Self::key_for(identity);
        let counted = self.backend.incr_with_ttl(key.as_str(), self.window);
        let count = match bounded(self.timeout, counted).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Like rate limiter unavailable, admitting request");
                return Ok(());
            }
        };

        if count > i64::from(self.limit) {
            debug!(%identity, count, limit = self.limit, "Like rate limit exceeded");
            return Err(EngagementError::RateLimited {
                retry_after: self.window,
            });
        }
        Ok(())
    }
}
