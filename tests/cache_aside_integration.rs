//! Integration Tests for the read path and invalidation
//!
//! A fake relational table sits behind the cache-aside accessor; domain
//! mutations go through the invalidation dispatcher the way a CRUD adapter
//! would call it after commit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use coherent_cache::cache::{CacheAside, CacheBackend, CacheKey, MemoryBackend, Namespace};
use coherent_cache::invalidation::{EventsSource, InvalidationEvent, Invalidator, ProjectsSource};
use coherent_cache::Domain;

const TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Project {
    id: i64,
    title: String,
    category: String,
}

/// Stand-in for the projects table, counting queries.
#[derive(Default)]
struct ProjectsTable {
    rows: RwLock<Vec<Project>>,
    queries: AtomicUsize,
}

impl ProjectsTable {
    async fn list(&self, category: Option<&str>) -> Result<Vec<Project>, String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|p| category.map_or(true, |c| p.category == c))
            .cloned()
            .collect())
    }

    async fn insert(&self, id: i64, title: &str, category: &str) {
        self.rows.write().await.push(Project {
            id,
            title: title.to_string(),
            category: category.to_string(),
        });
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

struct Harness {
    backend: MemoryBackend,
    cache: CacheAside,
    invalidator: Invalidator,
    table: Arc<ProjectsTable>,
}

fn harness() -> Harness {
    let backend = MemoryBackend::new(1_000);
    let shared: Arc<dyn CacheBackend> = Arc::new(backend.clone());
    Harness {
        cache: CacheAside::new(shared.clone(), TIMEOUT),
        invalidator: Invalidator::with_default_sources(shared, TIMEOUT),
        backend,
        table: Arc::new(ProjectsTable::default()),
    }
}

impl Harness {
    async fn list(&self, category: Option<&str>) -> Vec<Project> {
        let key = ProjectsSource::list_key(category, None);
        let table = self.table.clone();
        self.cache
            .cached(&key, || async move { table.list(category).await })
            .await
            .unwrap()
    }
}

// == Read Path ==

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let h = harness();
    h.table.insert(1, "Rover", "robotics").await;

    assert_eq!(h.list(None).await.len(), 1);
    assert_eq!(h.list(None).await.len(), 1);
    assert_eq!(h.table.queries(), 1);

    let stats = h.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_filters_are_cached_independently() {
    let h = harness();
    h.table.insert(1, "Rover", "robotics").await;
    h.table.insert(2, "Grid", "power").await;

    assert_eq!(h.list(Some("robotics")).await.len(), 1);
    assert_eq!(h.list(Some("power")).await.len(), 1);
    assert_eq!(h.list(None).await.len(), 2);
    assert_eq!(h.table.queries(), 3);
}

#[tokio::test]
async fn test_compute_error_propagates_and_is_not_cached() {
    let h = harness();
    let key = CacheKey::detail(Namespace::ProjectsDetail, 9);

    let err: Result<Project, String> = h
        .cache
        .cached(&key, || async { Err("connection reset".to_string()) })
        .await;
    assert_eq!(err.unwrap_err(), "connection reset");
    assert!(h.backend.peek(key.as_str()).await.is_none());
}

// == Invalidation ==

#[tokio::test]
async fn test_create_then_invalidate_shows_new_row() {
    let h = harness();
    h.table.insert(1, "Rover", "robotics").await;
    assert_eq!(h.list(None).await.len(), 1);
    assert_eq!(h.list(Some("robotics")).await.len(), 1);

    // committed write, then invalidation
    h.table.insert(2, "Arm", "robotics").await;
    let report = h
        .invalidator
        .dispatch(&InvalidationEvent::created(Domain::Projects, 2))
        .await;
    assert!(report.is_clean());
    assert_eq!(report.keys_evicted, 2);

    assert_eq!(h.list(None).await.len(), 2);
    assert_eq!(h.list(Some("robotics")).await.len(), 2);
}

#[tokio::test]
async fn test_invalidation_stays_inside_its_domain() {
    let h = harness();
    h.list(None).await;
    let events_stats = EventsSource::stats_key();
    h.backend
        .set(events_stats.as_str(), b"{\"upcoming\":3}", Duration::from_secs(60))
        .await
        .unwrap();

    h.invalidator.invalidate(Domain::Projects, Some(1)).await;

    assert!(h.backend.peek(events_stats.as_str()).await.is_some());
    assert!(h
        .backend
        .peek(ProjectsSource::list_key(None, None).as_str())
        .await
        .is_none());
}

#[tokio::test]
async fn test_child_change_only_touches_parent_detail() {
    let h = harness();
    let detail = CacheKey::detail(Namespace::ProjectsDetail, 4);
    h.backend
        .set(detail.as_str(), b"{}", Duration::from_secs(60))
        .await
        .unwrap();
    h.list(None).await;

    let event = InvalidationEvent::child(
        Domain::Projects,
        coherent_cache::invalidation::MutationKind::Created,
        31,
        4,
    );
    let report = h.invalidator.dispatch(&event).await;

    assert_eq!(report.keys_evicted, 1);
    assert!(h.backend.peek(detail.as_str()).await.is_none());
    assert!(h
        .backend
        .peek(ProjectsSource::list_key(None, None).as_str())
        .await
        .is_some());
}

// == Failure Modes ==

#[tokio::test]
async fn test_cache_outage_falls_back_to_table() {
    let h = harness();
    h.table.insert(1, "Rover", "robotics").await;
    h.backend.set_unreachable(true);

    assert_eq!(h.list(None).await.len(), 1);
    assert_eq!(h.list(None).await.len(), 1);
    assert_eq!(h.table.queries(), 2);
    assert_eq!(h.cache.stats().errors, 2);

    // invalidation during the outage is swallowed
    let report = h.invalidator.invalidate(Domain::Projects, None).await;
    assert_eq!(report.failures, 1);
}

#[tokio::test]
async fn test_slow_cache_is_bounded_by_timeout() {
    let h = harness();
    h.table.insert(1, "Rover", "robotics").await;
    h.backend.set_latency(Duration::from_secs(5));

    let started = std::time::Instant::now();
    assert_eq!(h.list(None).await.len(), 1);
    // one read and one write, each capped at TIMEOUT
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_missed_invalidation_heals_at_ttl() {
    let h = harness();
    h.table.insert(1, "Rover", "robotics").await;
    let key = ProjectsSource::list_key(None, None);
    let ttl = Duration::from_millis(200);

    let read = |table: Arc<ProjectsTable>| {
        let cache = h.cache.clone();
        let key = key.clone();
        async move {
            cache
                .get_or_compute(&key, ttl, || async move { table.list(None).await })
                .await
                .unwrap()
        }
    };

    assert_eq!(read(h.table.clone()).await.len(), 1);
    // write with no invalidation
    h.table.insert(2, "Arm", "robotics").await;
    assert_eq!(read(h.table.clone()).await.len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(read(h.table.clone()).await.len(), 2);
}
