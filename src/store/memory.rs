//! In-memory relational store.
//!
//! Behaves like the database for the parts the counter engine relies on:
//! one async mutex per entity row stands in for `SELECT ... FOR UPDATE`,
//! writes are staged in the transaction and applied all at once on commit,
//! and the like uniqueness constraint is re-checked at commit time.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::error::StoreError;
use crate::models::{EntityCounters, LikeRecord};
use crate::store::{EngagementStore, LikeTransaction};

#[derive(Debug, Clone, Copy)]
struct EntityRow {
    likeable: bool,
    like_count: u64,
    download_count: u64,
}

#[derive(Debug, Default)]
struct Tables {
    entities: HashMap<i64, EntityRow>,
    likes: HashMap<(i64, String), DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    failing_commits: AtomicUsize,
}

/// Recovers the data of a poisoned mutex; every critical section here
/// leaves the tables consistent before it can panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or resets) an entity with zeroed counters.
    pub fn insert_entity(&self, entity_id: i64, likeable: bool) {
        lock(&self.shared.tables).entities.insert(
            entity_id,
            EntityRow {
                likeable,
                like_count: 0,
                download_count: 0,
            },
        );
    }

    /// Approves or withdraws an entity.
    pub fn set_likeable(&self, entity_id: i64, likeable: bool) {
        if let Some(row) = lock(&self.shared.tables).entities.get_mut(&entity_id) {
            row.likeable = likeable;
        }
    }

    /// Committed like records of an entity, oldest first.
    pub fn like_records(&self, entity_id: i64) -> Vec<LikeRecord> {
        let tables = lock(&self.shared.tables);
        let mut records: Vec<LikeRecord> = tables
            .likes
            .iter()
            .filter(|((id, _), _)| *id == entity_id)
            .map(|((id, identity), created_at)| LikeRecord {
                entity_id: *id,
                identity_key: identity.clone(),
                created_at: *created_at,
            })
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.identity_key.cmp(&b.identity_key))
        });
        records
    }

    /// Makes the next `count` commits fail; their staged writes are discarded.
    pub fn fail_next_commits(&self, count: usize) {
        self.shared.failing_commits.store(count, Ordering::SeqCst);
    }

    fn row_lock(&self, entity_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.shared.row_locks)
            .entry(entity_id)
            .or_default()
            .clone()
    }

    fn committed_counters(tables: &Tables, entity_id: i64) -> Option<EntityCounters> {
        tables
            .entities
            .get(&entity_id)
            .filter(|row| row.likeable)
            .map(|row| EntityCounters {
                entity_id,
                like_count: row.like_count,
                download_count: row.download_count,
            })
    }
}

#[async_trait]
impl EngagementStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryTx {
            store: self.clone(),
            guards: Vec::new(),
            locked: HashSet::new(),
            staged: Vec::new(),
        })
    }

    async fn increment_download(&self, entity_id: i64) -> Result<Option<u64>, StoreError> {
        let mut tables = lock(&self.shared.tables);
        Ok(tables
            .entities
            .get_mut(&entity_id)
            .filter(|row| row.likeable)
            .map(|row| {
                row.download_count += 1;
                row.download_count
            }))
    }

    async fn counters(&self, entity_id: i64) -> Result<Option<EntityCounters>, StoreError> {
        Ok(Self::committed_counters(&lock(&self.shared.tables), entity_id))
    }

    async fn is_liked(&self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.shared.tables)
            .likes
            .contains_key(&(entity_id, identity_key.to_string())))
    }
}

// == Transaction ==
#[derive(Debug)]
enum Staged {
    InsertLike(i64, String, DateTime<Utc>),
    DeleteLike(i64, String),
    AdjustLikes(i64, i64),
}

/// Transaction over [`InMemoryStore`]. Dropping it without commit discards
/// every staged write and releases its row locks.
pub struct InMemoryTx {
    store: InMemoryStore,
    guards: Vec<OwnedMutexGuard<()>>,
    locked: HashSet<i64>,
    staged: Vec<Staged>,
}

impl InMemoryTx {
    /// Like membership as seen from inside this transaction.
    fn sees_like(&self, entity_id: i64, identity_key: &str) -> bool {
        let mut present = lock(&self.store.shared.tables)
            .likes
            .contains_key(&(entity_id, identity_key.to_string()));
        for op in &self.staged {
            match op {
                Staged::InsertLike(id, who, _) if *id == entity_id && who == identity_key => {
                    present = true
                }
                Staged::DeleteLike(id, who) if *id == entity_id && who == identity_key => {
                    present = false
                }
                _ => {}
            }
        }
        present
    }
}

#[async_trait]
impl LikeTransaction for InMemoryTx {
    async fn lock_entity(&mut self, entity_id: i64) -> Result<Option<EntityCounters>, StoreError> {
        if self.locked.insert(entity_id) {
            let guard = self.store.row_lock(entity_id).lock_owned().await;
            self.guards.push(guard);
        }
        // give competing transactions a chance to queue on the lock
        tokio::task::yield_now().await;

        let mut counters =
            InMemoryStore::committed_counters(&lock(&self.store.shared.tables), entity_id);
        if let Some(c) = counters.as_mut() {
            for op in &self.staged {
                if let Staged::AdjustLikes(id, delta) = op {
                    if *id == entity_id {
                        c.like_count = c.like_count.saturating_add_signed(*delta);
                    }
                }
            }
        }
        Ok(counters)
    }

    async fn has_like(&mut self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError> {
        Ok(self.sees_like(entity_id, identity_key))
    }

    async fn insert_like(
        &mut self,
        entity_id: i64,
        identity_key: &str,
    ) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        if self.sees_like(entity_id, identity_key) {
            return Ok(false);
        }
        self.staged.push(Staged::InsertLike(
            entity_id,
            identity_key.to_string(),
            Utc::now(),
        ));
        Ok(true)
    }

    async fn delete_like(
        &mut self,
        entity_id: i64,
        identity_key: &str,
    ) -> Result<bool, StoreError> {
        if !self.sees_like(entity_id, identity_key) {
            return Ok(false);
        }
        self.staged
            .push(Staged::DeleteLike(entity_id, identity_key.to_string()));
        Ok(true)
    }

    async fn adjust_like_count(&mut self, entity_id: i64, delta: i64) -> Result<(), StoreError> {
        self.staged.push(Staged::AdjustLikes(entity_id, delta));
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let failing = &self.store.shared.failing_commits;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Aborted("injected commit failure".into()));
        }

        let mut tables = lock(&self.store.shared.tables);

        // uniqueness is enforced at commit as well as at insert
        for op in &self.staged {
            if let Staged::InsertLike(id, who, _) = op {
                if tables.likes.contains_key(&(*id, who.clone())) {
                    let deleted_first = self.staged.iter().any(
                        |o| matches!(o, Staged::DeleteLike(d, w) if d == id && w == who),
                    );
                    if !deleted_first {
                        return Err(StoreError::Aborted(format!(
                            "duplicate like for entity {id}"
                        )));
                    }
                }
            }
        }

        for op in self.staged {
            match op {
                Staged::InsertLike(id, who, at) => {
                    tables.likes.insert((id, who), at);
                }
                Staged::DeleteLike(id, who) => {
                    tables.likes.remove(&(id, who));
                }
                Staged::AdjustLikes(id, delta) => {
                    if let Some(row) = tables.entities.get_mut(&id) {
                        row.like_count = row.like_count.saturating_add_signed(delta);
                    }
                }
            }
        }
        // row guards drop with `self.guards` after the tables are updated
        drop(tables);
        drop(self.guards);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible_and_rolled_back() {
        let store = InMemoryStore::new();
        store.insert_entity(1, true);

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_entity(1).await.unwrap();
            assert!(tx.insert_like(1, "10.0.0.1").await.unwrap());
            tx.adjust_like_count(1, 1).await.unwrap();
            assert!(tx.has_like(1, "10.0.0.1").await.unwrap());
            assert!(!store.is_liked(1, "10.0.0.1").await.unwrap());
            // dropped without commit
        }

        assert!(!store.is_liked(1, "10.0.0.1").await.unwrap());
        assert_eq!(store.counters(1).await.unwrap().unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn test_commit_applies_everything() {
        let store = InMemoryStore::new();
        store.insert_entity(1, true);

        let mut tx = store.begin().await.unwrap();
        let before = tx.lock_entity(1).await.unwrap().unwrap();
        assert_eq!(before.like_count, 0);
        assert!(tx.insert_like(1, "a").await.unwrap());
        assert!(!tx.insert_like(1, "a").await.unwrap());
        tx.adjust_like_count(1, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.is_liked(1, "a").await.unwrap());
        assert_eq!(store.counters(1).await.unwrap().unwrap().like_count, 1);
        assert_eq!(store.like_records(1).len(), 1);
    }

    #[tokio::test]
    async fn test_injected_commit_failure_discards_writes() {
        let store = InMemoryStore::new();
        store.insert_entity(1, true);
        store.fail_next_commits(1);

        let mut tx = store.begin().await.unwrap();
        tx.lock_entity(1).await.unwrap();
        tx.insert_like(1, "a").await.unwrap();
        tx.adjust_like_count(1, 1).await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Aborted(_))));

        assert!(store.like_records(1).is_empty());
        assert_eq!(store.counters(1).await.unwrap().unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction() {
        let store = InMemoryStore::new();
        store.insert_entity(1, true);

        let mut first = store.begin().await.unwrap();
        first.lock_entity(1).await.unwrap();

        let contender = store.clone();
        let handle = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.lock_entity(1).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished(), "second lock must wait for the first");

        first.commit().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unlikeable_entity_is_hidden() {
        let store = InMemoryStore::new();
        store.insert_entity(1, false);

        assert!(store.counters(1).await.unwrap().is_none());
        assert!(store.increment_download(1).await.unwrap().is_none());
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_entity(1).await.unwrap().is_none());
        assert!(tx.lock_entity(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_like_count_saturates_at_zero() {
        let store = InMemoryStore::new();
        store.insert_entity(1, true);

        let mut tx = store.begin().await.unwrap();
        tx.lock_entity(1).await.unwrap();
        tx.adjust_like_count(1, -1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.counters(1).await.unwrap().unwrap().like_count, 0);
    }
}
