//! Cache backend seam.
//!
//! The external key-value store is injected behind this trait so call sites
//! never reach for a process-wide client. Backends report failures honestly;
//! deciding to fail open is the caller's job.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the stored bytes, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` for `ttl`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key matching a `prefix*` glob; returns how many.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Atomically increments an integer key, setting `ttl` when it is created.
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, CacheError>;
}

/// Bounds a backend call by the cache timeout.
pub async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout(timeout)),
    }
}
