//! Aggregate Counter Engine
//!
//! Likes and downloads. Every mutation runs in one relational transaction;
//! the entity's detail key is evicted only after that transaction commits,
//! and the response carries counters re-read after the commit.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheAside, CacheBackend, CacheKey, Namespace};
use crate::config::Config;
use crate::domain::Domain;
use crate::engagement::identity::ClientIdentity;
use crate::engagement::rate_limit::LikeRateLimiter;
use crate::error::{EngagementError, Result};
use crate::invalidation::Invalidator;
use crate::models::{DownloadStatus, EntityCounters, LikeStatus};
use crate::store::{EngagementStore, LikeTransaction};

/// Desired like state of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Toggle,
    Like,
    Unlike,
}

pub struct EngagementEngine<S> {
    store: S,
    cache: CacheAside,
    invalidator: Arc<Invalidator>,
    limiter: Option<LikeRateLimiter>,
    domain: Domain,
}

impl<S: EngagementStore> EngagementEngine<S> {
    /// Engine for academic resources, without rate limiting.
    pub fn new(store: S, cache: CacheAside, invalidator: Arc<Invalidator>) -> Self {
        Self {
            store,
            cache,
            invalidator,
            limiter: None,
            domain: Domain::Academics,
        }
    }

    /// Engine over `backend` configured from `config`: cache timeout for
    /// reads and evictions, and the like rate limit.
    pub fn from_config(store: S, backend: Arc<dyn CacheBackend>, config: &Config) -> Self {
        let timeout = config.cache_timeout();
        Self::new(
            store,
            CacheAside::new(backend.clone(), timeout),
            Arc::new(Invalidator::with_default_sources(backend.clone(), timeout)),
        )
        .with_rate_limiter(LikeRateLimiter::from_config(backend, config))
    }

    /// Throttles like mutations per identity before any relational work.
    pub fn with_rate_limiter(mut self, limiter: LikeRateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Domain whose detail views hold the counters.
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Underlying relational store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Detail view key holding the counters of `entity_id`.
    pub fn detail_key(&self, entity_id: i64) -> CacheKey {
        CacheKey::detail(Namespace::detail_of(self.domain), entity_id)
    }

    // == Likes ==
    /// Flips the like state of `identity` on the entity.
    pub async fn toggle_like(
        &self,
        entity_id: i64,
        identity: &ClientIdentity,
    ) -> Result<LikeStatus> {
        self.transition(entity_id, identity, Intent::Toggle).await
    }

    /// Sets the like state to liked. Liking twice is a no-op.
    pub async fn like(&self, entity_id: i64, identity: &ClientIdentity) -> Result<LikeStatus> {
        self.transition(entity_id, identity, Intent::Like).await
    }

    /// Sets the like state to not liked. Never drives the count below zero.
    pub async fn unlike(&self, entity_id: i64, identity: &ClientIdentity) -> Result<LikeStatus> {
        self.transition(entity_id, identity, Intent::Unlike).await
    }

    /// Committed like state of `identity`.
    pub async fn is_liked(&self, entity_id: i64, identity: &ClientIdentity) -> Result<bool> {
        Ok(self.store.is_liked(entity_id, identity.as_str()).await?)
    }

    async fn transition(
        &self,
        entity_id: i64,
        identity: &ClientIdentity,
        intent: Intent,
    ) -> Result<LikeStatus> {
        if let Some(limiter) = &self.limiter {
            limiter.check(identity).await?;
        }
        let who = identity.as_str();

        // Dropping `tx` on any early return rolls it back
        let mut tx = self.store.begin().await?;
        let locked = tx
            .lock_entity(entity_id)
            .await?
            .ok_or(EngagementError::NotFound(entity_id))?;

        let liked_before = tx.has_like(entity_id, who).await?;
        let liked = match intent {
            Intent::Toggle => !liked_before,
            Intent::Like => true,
            Intent::Unlike => false,
        };

        let changed = match (liked_before, liked) {
            (false, true) => tx.insert_like(entity_id, who).await?,
            (true, false) => tx.delete_like(entity_id, who).await?,
            _ => false,
        };
        let delta = match (changed, liked) {
            (false, _) => 0,
            (true, true) => 1,
            (true, false) => -1,
        };
        if delta != 0 {
            tx.adjust_like_count(entity_id, delta).await?;
        }
        tx.commit().await?;

        self.invalidator.evict_key(&self.detail_key(entity_id)).await;
        let committed = EntityCounters {
            like_count: locked.like_count.saturating_add_signed(delta),
            ..locked
        };
        let counters = self.counters_after_commit(entity_id, committed).await;

        info!(
            entity_id,
            %identity,
            ?intent,
            liked,
            changed,
            like_count = counters.like_count,
            "Like committed"
        );
        Ok(LikeStatus {
            entity_id,
            liked,
            like_count: counters.like_count,
            changed,
        })
    }

    // == Downloads ==
    /// Adds one download. No deduplication.
    pub async fn increment_download(&self, entity_id: i64) -> Result<DownloadStatus> {
        let download_count = self
            .store
            .increment_download(entity_id)
            .await?
            .ok_or(EngagementError::NotFound(entity_id))?;

        self.invalidator.evict_key(&self.detail_key(entity_id)).await;
        debug!(entity_id, download_count, "Download counted");
        Ok(DownloadStatus {
            entity_id,
            download_count,
        })
    }

    // == Reads ==
    /// Counters straight from the relational store.
    pub async fn counters(&self, entity_id: i64) -> Result<EntityCounters> {
        self.fresh_counters(entity_id).await
    }

    /// Counters through the detail cache key.
    pub async fn cached_counters(&self, entity_id: i64) -> Result<EntityCounters> {
        let key = self.detail_key(entity_id);
        self.cache
            .cached(&key, || self.fresh_counters(entity_id))
            .await
    }

    /// Re-read after a committed mutation. The mutation already happened, so
    /// a failed or empty read falls back to the counters written under the
    /// row lock instead of failing the request.
    async fn counters_after_commit(
        &self,
        entity_id: i64,
        committed: EntityCounters,
    ) -> EntityCounters {
        match self.store.counters(entity_id).await {
            Ok(Some(counters)) => counters,
            Ok(None) => {
                debug!(entity_id, "Entity withdrawn after commit, using locked counters");
                committed
            }
            Err(e) => {
                warn!(entity_id, error = %e, "Counter re-read failed, using locked counters");
                committed
            }
        }
    }

    async fn fresh_counters(&self, entity_id: i64) -> Result<EntityCounters> {
        self.store
            .counters(entity_id)
            .await?
            .ok_or(EngagementError::NotFound(entity_id))
    }
}
