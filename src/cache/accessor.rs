//! Cache-Aside Accessor
//!
//! The read path: look in the cache, recompute from the relational store on
//! a miss, write the result back. The cache is an optimization only; any
//! cache failure falls through to `compute` and is logged, never returned.
//!
//! No lock is taken around recomputation. Concurrent misses on one key may
//! each run `compute`, which is acceptable because `compute` only reads.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::backend::{bounded, CacheBackend};
use crate::cache::{CacheKey, CacheStats, StatsRecorder};
use crate::error::CacheError;

// == Cache Aside ==
#[derive(Clone)]
pub struct CacheAside {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
    stats: Arc<StatsRecorder>,
}

impl CacheAside {
    /// `timeout` bounds every individual cache call.
    pub fn new(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            stats: Arc::new(StatsRecorder::new()),
        }
    }

    pub fn backend(&self) -> Arc<dyn CacheBackend> {
        self.backend.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snapshot of hit, miss and failure counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Same as [`get_or_compute`](Self::get_or_compute) with the namespace's
    /// policy TTL.
    pub async fn cached<T, E, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute(key, key.namespace().ttl(), compute)
            .await
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or the result of `compute`.
    ///
    /// `compute` errors are relational errors and propagate unchanged; an
    /// error result is never cached. A zero `ttl` skips the write-back.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let read = bounded(self.timeout, self.backend.get(key.as_str()))
            .await
            .and_then(|bytes| bytes.map(|b| decode::<T>(&b)).transpose());

        match read {
            Ok(Some(value)) => {
                self.stats.record_hit();
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                self.stats.record_miss();
                debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                // an undecodable value is a stale shape from an older release
                self.stats.record_error();
                warn!(key = %key, error = %e, "Cache read failed, recomputing");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if ttl.is_zero() {
            warn!(key = %key, "Zero ttl, skipping cache write");
            return;
        }

        let written = match encode(value) {
            Ok(bytes) => bounded(self.timeout, self.backend.set(key.as_str(), &bytes, ttl)).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                self.stats.record_write();
                debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache populated");
            }
            Err(e) => {
                self.stats.record_write_failure();
                warn!(key = %key, error = %e, "Cache write failed");
            }
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    Ok(serde_json::from_slice(bytes)?)
}
