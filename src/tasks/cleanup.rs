//! Expiry Sweeper
//!
//! Expired entries are already invisible to reads; the sweep only reclaims
//! their memory and LRU slots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{MemoryBackend, MemoryStore};
use crate::config::Config;

/// In-memory backend holding at most `config.max_entries` entries, with its
/// sweeper running every `config.cleanup_interval` seconds.
pub fn spawn_memory_backend(config: &Config) -> (MemoryBackend, JoinHandle<()>) {
    let backend = MemoryBackend::new(config.max_entries);
    let sweeper = spawn_cleanup_task(backend.store(), config.cleanup_interval);
    (backend, sweeper)
}

/// Spawns a task purging expired entries every `interval_secs` seconds
/// (minimum 1). Abort the returned handle to stop it.
///
/// # Example
/// ```ignore
/// let backend = MemoryBackend::new(10_000);
/// let sweeper = spawn_cleanup_task(backend.store(), 30);
/// // on shutdown
/// sweeper.abort();
/// ```
pub fn spawn_cleanup_task(store: Arc<RwLock<MemoryStore>>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Expiry sweeper started");

        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = store.write().await.cleanup_expired();
            if removed > 0 {
                info!(removed, "Expired cache entries purged");
            } else {
                debug!("Expiry sweep found nothing");
            }
        }
    })
}
