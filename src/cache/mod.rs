//! Cache Module
//!
//! Cache-aside reads over an injected key-value backend: TTL policy, key
//! construction, the backend seam with in-memory and Redis implementations,
//! and the accessor itself.

mod accessor;
mod backend;
mod entry;
mod keys;
mod lru;
mod memory;
mod policy;
mod redis_backend;
mod stats;


// Re-export public types
pub use accessor::CacheAside;
pub use backend::{bounded, CacheBackend};
pub use entry::CacheEntry;
pub use keys::{CacheKey, CacheKeyBuilder, ALL_SENTINEL};
pub use lru::LruTracker;
pub use memory::{MemoryBackend, MemoryStore};
pub use policy::Namespace;
pub use redis_backend::RedisBackend;
pub use stats::{CacheStats, StatsRecorder};

// == Public Constants ==
/// Longest key stored verbatim; longer canonical keys are digested.
pub const MAX_KEY_LENGTH: usize = 250;

/// Maximum serialized value size accepted by the in-memory backend
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
