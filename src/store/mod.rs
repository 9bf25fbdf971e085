//! Relational store seam.
//!
//! The counter engine needs three things from the database: a transaction
//! holding a row lock on one entity, a uniqueness-enforced like insert, and
//! atomic column increments. Dropping an uncommitted transaction must roll
//! it back.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::EntityCounters;

pub use memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, TableNames};

#[async_trait]
pub trait EngagementStore: Send + Sync {
    type Tx: LikeTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Atomic `download_count + 1` on a likeable entity; `None` when absent.
    async fn increment_download(&self, entity_id: i64) -> Result<Option<u64>, StoreError>;

    /// Committed counters of a likeable entity.
    async fn counters(&self, entity_id: i64) -> Result<Option<EntityCounters>, StoreError>;

    async fn is_liked(&self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait LikeTransaction: Send {
    /// Locks the entity row until commit or drop. `None` when the entity is
    /// absent or not likeable.
    async fn lock_entity(&mut self, entity_id: i64) -> Result<Option<EntityCounters>, StoreError>;

    async fn has_like(&mut self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError>;

    /// `false` when the uniqueness constraint rejected a duplicate.
    async fn insert_like(&mut self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError>;

    /// `false` when there was nothing to delete.
    async fn delete_like(&mut self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError>;

    /// Adds `delta` to `like_count`, never going below zero.
    async fn adjust_like_count(&mut self, entity_id: i64, delta: i64) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
