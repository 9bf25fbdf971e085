//! Invalidation Dispatcher
//!
//! The write path. Called after a domain mutation has committed, never
//! before and never inside the transaction. Asks the domain's registered
//! adapter which keys to drop and drops them. Eviction failures are logged
//! and swallowed; a surviving stale entry is bounded by its TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{bounded, CacheBackend, CacheKey};
use crate::domain::Domain;
use crate::invalidation::event::{InvalidationEvent, MutationKind};
use crate::invalidation::sources::{default_sources, Eviction, MutationSource};

/// What a dispatch actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// Keys removed from the cache store
    pub keys_evicted: usize,
    /// Evictions that failed and were swallowed
    pub failures: usize,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

// == Builder ==
pub struct InvalidatorBuilder {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
    sources: HashMap<Domain, Box<dyn MutationSource>>,
}

impl InvalidatorBuilder {
    /// Bound on each eviction call (default 250 ms).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers the adapter for its domain, replacing any earlier one.
    pub fn register<S: MutationSource + 'static>(self, source: S) -> Self {
        self.register_boxed(Box::new(source))
    }

    /// Same as [`register`](Self::register) for an already boxed adapter.
    pub fn register_boxed(mut self, source: Box<dyn MutationSource>) -> Self {
        let domain = source.domain();
        if self.sources.insert(domain, source).is_some() {
            warn!(%domain, "Replacing previously registered mutation source");
        }
        self
    }

    /// Freezes the registry. Adapters cannot be added afterwards.
    pub fn build(self) -> Invalidator {
        let mut domains: Vec<Domain> = self.sources.keys().copied().collect();
        domains.sort();
        info!(?domains, "Invalidation dispatcher ready");
        Invalidator {
            backend: self.backend,
            timeout: self.timeout,
            sources: self.sources,
        }
    }
}

// == Invalidator ==
pub struct Invalidator {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
    sources: HashMap<Domain, Box<dyn MutationSource>>,
}

impl Invalidator {
    /// Starts an empty registry evicting from `backend`.
    pub fn builder(backend: Arc<dyn CacheBackend>) -> InvalidatorBuilder {
        InvalidatorBuilder {
            backend,
            timeout: Duration::from_millis(250),
            sources: HashMap::new(),
        }
    }

    /// Dispatcher with the adapter of every domain registered.
    pub fn with_default_sources(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        default_sources()
            .into_iter()
            .fold(Self::builder(backend).timeout(timeout), |b, s| b.register_boxed(s))
            .build()
    }

    /// Whether an adapter handles `domain`.
    pub fn is_registered(&self, domain: Domain) -> bool {
        self.sources.contains_key(&domain)
    }

    /// Evicts the detail key of `entity_id`, or every listing of the domain
    /// when no id is given.
    pub async fn invalidate(&self, domain: Domain, entity_id: Option<i64>) -> InvalidationReport {
        let kind = if entity_id.is_some() {
            MutationKind::Updated
        } else {
            MutationKind::Created
        };
        self.dispatch(&InvalidationEvent::new(domain, kind, entity_id))
            .await
    }

    // == Dispatch ==
    pub async fn dispatch(&self, event: &InvalidationEvent) -> InvalidationReport {
        let Some(source) = self.sources.get(&event.domain) else {
            warn!(domain = %event.domain, "No mutation source registered, nothing evicted");
            return InvalidationReport::default();
        };

        let mut report = InvalidationReport::default();
        for eviction in source.evictions(event) {
            match self.evict(&eviction).await {
                Some(removed) => report.keys_evicted += removed,
                None => report.failures += 1,
            }
        }

        info!(
            domain = %event.domain,
            kind = ?event.kind,
            entity_id = ?event.entity_id,
            category = ?event.context.category,
            keys_evicted = report.keys_evicted,
            failures = report.failures,
            "Cache invalidated"
        );
        report
    }

    /// Evicts a single key directly, bypassing adapters. Used by the counter
    /// engine, which knows exactly which detail view it changed.
    pub async fn evict_key(&self, key: &CacheKey) -> InvalidationReport {
        match self.evict(&Eviction::Key(key.clone())).await {
            Some(removed) => InvalidationReport {
                keys_evicted: removed,
                failures: 0,
            },
            None => InvalidationReport {
                keys_evicted: 0,
                failures: 1,
            },
        }
    }

    /// `None` when the eviction failed.
    async fn evict(&self, eviction: &Eviction) -> Option<usize> {
        let result = match eviction {
            Eviction::Key(key) => bounded(self.timeout, self.backend.delete(key.as_str()))
                .await
                .map(usize::from),
            Eviction::Namespace(ns) => {
                let pattern = CacheKey::namespace_pattern(*ns);
                bounded(self.timeout, self.backend.delete_pattern(&pattern)).await
            }
        };

        match result {
            Ok(removed) => {
                debug!(?eviction, removed, "Evicted");
                Some(removed)
            }
            Err(e) => {
                warn!(?eviction, error = %e, "Cache eviction failed, entry lives until ttl");
                None
            }
        }
    }
}
