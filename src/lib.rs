//! Coherent Cache - cache-aside reads with typed invalidation and race-safe
//! engagement counters
//!
//! A shared key-value cache in front of expensive list and detail queries
//! from six domains. Each domain evicts exactly the keys it owns after its
//! mutations commit, and like/download counters stay correct under
//! concurrent anonymous traffic.

pub mod cache;
pub mod config;
pub mod domain;
pub mod engagement;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod store;
pub mod tasks;

pub use cache::{CacheAside, CacheBackend, CacheKey, MemoryBackend, Namespace, RedisBackend};
pub use config::Config;
pub use domain::Domain;
pub use engagement::{ClientIdentity, EngagementEngine, LikeRateLimiter};
pub use error::{CacheError, EngagementError, StoreError};
pub use invalidation::{InvalidationEvent, InvalidationReport, Invalidator, MutationSource};
pub use tasks::{spawn_cleanup_task, spawn_memory_backend};
