//! Postgres relational store.
//!
//! Expected schema (names configurable through [`TableNames`]):
//!
//! ```sql
//! CREATE TABLE academic_resources (
//!     id             BIGINT PRIMARY KEY,
//!     is_approved    BOOLEAN NOT NULL DEFAULT FALSE,
//!     is_active      BOOLEAN NOT NULL DEFAULT TRUE,
//!     like_count     INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
//!     download_count INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0)
//! );
//! CREATE TABLE resource_likes (
//!     resource_id BIGINT NOT NULL REFERENCES academic_resources(id) ON DELETE CASCADE,
//!     ip_address  TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     UNIQUE (resource_id, ip_address)
//! );
//! ```

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::error::StoreError;
use crate::models::EntityCounters;
use crate::store::{EngagementStore, LikeTransaction};

/// Table and column names. Identifiers are interpolated into SQL, so they
/// are validated when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub entities: String,
    pub likes: String,
    /// Column in `likes` referencing the entity
    pub like_entity_column: String,
    /// Column in `likes` holding the identity key
    pub like_identity_column: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            entities: "academic_resources".to_string(),
            likes: "resource_likes".to_string(),
            like_entity_column: "resource_id".to_string(),
            like_identity_column: "ip_address".to_string(),
        }
    }
}

impl TableNames {
    /// Rejects names that are not lowercase `[a-z0-9_]` identifiers.
    pub fn validate(&self) -> Result<(), StoreError> {
        for ident in [
            &self.entities,
            &self.likes,
            &self.like_entity_column,
            &self.like_identity_column,
        ] {
            let valid = !ident.is_empty()
                && ident.len() <= 63
                && ident
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                && !ident.starts_with(|c: char| c.is_ascii_digit());
            if !valid {
                return Err(StoreError::Unavailable(format!(
                    "invalid SQL identifier: {ident:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Prebuilt statements for one set of table names.
#[derive(Debug, Clone)]
struct Statements {
    lock_entity: String,
    select_counters: String,
    has_like: String,
    insert_like: String,
    delete_like: String,
    adjust_likes: String,
    increment_download: String,
}

impl Statements {
    fn new(t: &TableNames) -> Self {
        let (e, l, fk, who) = (
            &t.entities,
            &t.likes,
            &t.like_entity_column,
            &t.like_identity_column,
        );
        let likeable = "is_approved AND is_active";
        Self {
            lock_entity: format!(
                "SELECT id, like_count::BIGINT, download_count::BIGINT FROM {e} \
                 WHERE id = $1 AND {likeable} FOR UPDATE"
            ),
            select_counters: format!(
                "SELECT id, like_count::BIGINT, download_count::BIGINT FROM {e} \
                 WHERE id = $1 AND {likeable}"
            ),
            has_like: format!("SELECT EXISTS (SELECT 1 FROM {l} WHERE {fk} = $1 AND {who} = $2)"),
            insert_like: format!(
                "INSERT INTO {l} ({fk}, {who}, created_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT ({fk}, {who}) DO NOTHING"
            ),
            delete_like: format!("DELETE FROM {l} WHERE {fk} = $1 AND {who} = $2"),
            adjust_likes: format!(
                "UPDATE {e} SET like_count = GREATEST(like_count + $2, 0) WHERE id = $1"
            ),
            increment_download: format!(
                "UPDATE {e} SET download_count = download_count + 1 \
                 WHERE id = $1 AND {likeable} RETURNING download_count::BIGINT"
            ),
        }
    }
}

fn to_counters((entity_id, like_count, download_count): (i64, i64, i64)) -> EntityCounters {
    EntityCounters {
        entity_id,
        like_count: like_count.max(0) as u64,
        download_count: download_count.max(0) as u64,
    }
}

// == Postgres Store ==
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    sql: std::sync::Arc<Statements>,
}

impl PostgresStore {
    /// Store over the default `academic_resources` and `resource_likes` tables.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            sql: std::sync::Arc::new(Statements::new(&TableNames::default())),
        }
    }

    /// Store over custom tables, validated before any SQL is built.
    pub fn with_tables(pool: PgPool, tables: TableNames) -> Result<Self, StoreError> {
        tables.validate()?;
        Ok(Self {
            pool,
            sql: std::sync::Arc::new(Statements::new(&tables)),
        })
    }

    /// Opens a pool of at most `max_connections` against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        info!(max_connections, "Postgres pool connected");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl EngagementStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
            sql: self.sql.clone(),
        })
    }

    async fn increment_download(&self, entity_id: i64) -> Result<Option<u64>, StoreError> {
        let count: Option<i64> = sqlx::query_scalar(&self.sql.increment_download)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    async fn counters(&self, entity_id: i64) -> Result<Option<EntityCounters>, StoreError> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(&self.sql.select_counters)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(to_counters))
    }

    async fn is_liked(&self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(&self.sql.has_like)
            .bind(entity_id)
            .bind(identity_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

// == Transaction ==
/// Wraps a sqlx transaction; sqlx rolls back on drop.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    sql: std::sync::Arc<Statements>,
}

#[async_trait]
impl LikeTransaction for PostgresTx {
    async fn lock_entity(&mut self, entity_id: i64) -> Result<Option<EntityCounters>, StoreError> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(&self.sql.lock_entity)
            .bind(entity_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(to_counters))
    }

    async fn has_like(&mut self, entity_id: i64, identity_key: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(&self.sql.has_like)
            .bind(entity_id)
            .bind(identity_key)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn insert_like(
        &mut self,
        entity_id: i64,
        identity_key: &str,
    ) -> Result<bool, StoreError> {
        // ON CONFLICT keeps the transaction usable; a raw unique violation
        // would abort it
        let result = sqlx::query(&self.sql.insert_like)
            .bind(entity_id)
            .bind(identity_key)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_like(
        &mut self,
        entity_id: i64,
        identity_key: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(&self.sql.delete_like)
            .bind(entity_id)
            .bind(identity_key)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_like_count(&mut self, entity_id: i64, delta: i64) -> Result<(), StoreError> {
        sqlx::query(&self.sql.adjust_likes)
            .bind(entity_id)
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
