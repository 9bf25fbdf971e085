//! In-memory cache backend
//!
//! HashMap storage with LRU capacity eviction and TTL expiry, plus fault
//! injection so tests can take the "cache" down or make it slow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::backend::CacheBackend;
use crate::cache::{CacheEntry, LruTracker, MAX_VALUE_SIZE};
use crate::error::CacheError;

// == Memory Store ==
/// Synchronous storage engine behind [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    max_entries: usize,
    evictions: u64,
}

impl MemoryStore {
    /// Creates a store holding at most `max_entries` keys (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            max_entries: max_entries.max(1),
            evictions: 0,
        }
    }

    /// Stores a value, evicting the least recently used key at capacity.
    pub fn set(&mut self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::Backend(format!(
                "value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.evictions += 1;
            }
        }

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        self.lru.touch(key);
        Ok(())
    }

    /// Returns a live value; expired entries are dropped on access.
    pub fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.remove(key);
            return None;
        }
        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Removes a key, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove(key).is_some()
    }

    /// Deletes keys matching `pattern`: a trailing `*` matches any suffix,
    /// anything else must match exactly.
    pub fn delete_matching(&mut self, pattern: &str) -> usize {
        let doomed: Vec<String> = match pattern.strip_suffix('*') {
            Some(prefix) => self
                .entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
            None => self
                .entries
                .keys()
                .filter(|key| key.as_str() == pattern)
                .cloned()
                .collect(),
        };

        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    /// Increments an integer value. A missing or expired key starts at 1 with
    /// a fresh `ttl`; an existing one keeps its expiry.
    pub fn incr(&mut self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        let current = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                let text = std::str::from_utf8(&entry.value)
                    .map_err(|_| CacheError::Backend(format!("{key} is not an integer")))?;
                Some((
                    text.parse::<i64>()
                        .map_err(|_| CacheError::Backend(format!("{key} is not an integer")))?,
                    entry.expires_at,
                ))
            }
            _ => None,
        };

        match current {
            Some((value, expires_at)) => {
                let next = value + 1;
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.value = next.to_string().into_bytes();
                    entry.expires_at = expires_at;
                }
                self.lru.touch(key);
                Ok(next)
            }
            None => {
                self.set(key, b"1".to_vec(), ttl)?;
                Ok(1)
            }
        }
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Remaining lifetime of a live key.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl_remaining())
    }

    /// Entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys dropped to make room.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.lru.remove(key);
        self.entries.remove(key)
    }
}

// == Memory Backend ==
/// [`CacheBackend`] over a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    store: Arc<RwLock<MemoryStore>>,
    faults: Arc<Faults>,
}

#[derive(Debug, Default)]
struct Faults {
    unreachable: AtomicBool,
    reject_writes: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryBackend {
    /// Backend over a fresh store of `max_entries` capacity.
    pub fn new(max_entries: usize) -> Self {
        Self::from_store(Arc::new(RwLock::new(MemoryStore::new(max_entries))))
    }

    pub fn from_store(store: Arc<RwLock<MemoryStore>>) -> Self {
        Self {
            store,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Shared handle to the underlying store, e.g. for the expiry sweeper.
    pub fn store(&self) -> Arc<RwLock<MemoryStore>> {
        self.store.clone()
    }

    /// Every operation fails with `Unavailable` while set.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Only `set` fails while set; reads keep working.
    pub fn set_reject_writes(&self, reject: bool) {
        self.faults.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Delays every operation, to exercise the cache timeout.
    pub fn set_latency(&self, latency: Duration) {
        self.faults
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Entries held by the store, ignoring fault injection.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Reads a key bypassing fault injection, for assertions.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.store.write().await.get(key)
    }

    async fn gate(&self) -> Result<(), CacheError> {
        let latency = self.faults.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory backend marked unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gate().await?;
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.gate().await?;
        if self.faults.reject_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("memory backend rejecting writes".into()));
        }
        self.store.write().await.set(key, value.to_vec(), ttl)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.gate().await?;
        Ok(self.store.write().await.delete(key))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        self.gate().await?;
        Ok(self.store.write().await.delete_matching(pattern))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        self.gate().await?;
        self.store.write().await.incr(key, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_store_set_and_get() {
        let mut store = MemoryStore::new(10);
        store.set("k", b"v".to_vec(), HOUR).unwrap();
        assert_eq!(store.get("k"), Some(b"v".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_expiry_on_read() {
        let mut store = MemoryStore::new(10);
        store.set("k", b"v".to_vec(), Duration::from_millis(30)).unwrap();
        sleep(Duration::from_millis(60));
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = MemoryStore::new(2);
        store.set("a", b"1".to_vec(), HOUR).unwrap();
        store.set("b", b"2".to_vec(), HOUR).unwrap();
        store.get("a");
        store.set("c", b"3".to_vec(), HOUR).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get("b").is_none());
        assert!(store.get("a").is_some());
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn test_store_rejects_oversized_value() {
        let mut store = MemoryStore::new(2);
        let result = store.set("big", vec![0; MAX_VALUE_SIZE + 1], HOUR);
        assert!(matches!(result, Err(CacheError::Backend(_))));
    }

    #[test]
    fn test_delete_matching_prefix_only() {
        let mut store = MemoryStore::new(10);
        store.set("gallery.albums:type=all", b"1".to_vec(), HOUR).unwrap();
        store.set("gallery.albums:type=eesa", b"1".to_vec(), HOUR).unwrap();
        store.set("gallery.album:id=1", b"1".to_vec(), HOUR).unwrap();

        assert_eq!(store.delete_matching("gallery.albums:*"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.delete_matching("gallery.album:id=1"), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_incr_starts_at_one_and_keeps_expiry() {
        let mut store = MemoryStore::new(10);
        assert_eq!(store.incr("n", Duration::from_millis(40)).unwrap(), 1);
        assert_eq!(store.incr("n", HOUR).unwrap(), 2);
        sleep(Duration::from_millis(60));
        // original 40ms window elapsed, counter restarts
        assert_eq!(store.incr("n", HOUR).unwrap(), 1);
    }

    #[test]
    fn test_incr_rejects_non_integer() {
        let mut store = MemoryStore::new(10);
        store.set("n", b"abc".to_vec(), HOUR).unwrap();
        assert!(store.incr("n", HOUR).is_err());
    }

    #[test]
    fn test_cleanup_expired() {
        let mut store = MemoryStore::new(10);
        store.set("short", b"1".to_vec(), Duration::from_millis(20)).unwrap();
        store.set("long", b"1".to_vec(), HOUR).unwrap();
        sleep(Duration::from_millis(50));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_unreachable() {
        let backend = MemoryBackend::new(10);
        backend.set("k", b"v", HOUR).await.unwrap();

        backend.set_unreachable(true);
        assert!(matches!(
            backend.get("k").await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(backend.delete_pattern("k*").await.is_err());

        backend.set_unreachable(false);
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_backend_reject_writes_only() {
        let backend = MemoryBackend::new(10);
        backend.set("k", b"v", HOUR).await.unwrap();
        backend.set_reject_writes(true);

        assert!(backend.set("k2", b"v", HOUR).await.is_err());
        assert!(backend.get("k").await.unwrap().is_some());
    }
}
