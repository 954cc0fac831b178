use crate::clock::{Clock, SystemClock};
use crate::fallback;
use crate::model::{Snapshot, SnapshotOrigin};
use crate::pipeline::build_catalog;
use crate::properties::PropertyTables;
use crate::source::CatalogSource;
use nav_core::metrics::{self, CACHE_RESULT_HIT, CACHE_RESULT_MISS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

/// Time-boxed holder of the current directory snapshot.
///
/// Reads are served from the stored snapshot until it is `ttl` old; the next
/// read after that rebuilds it. Only one rebuild runs at a time and readers
/// that raced past expiry wait for it instead of fetching again. A failed
/// rebuild stores the built-in fallback directory, so callers always get a
/// snapshot.
///
/// Rebuilds run on their own task holding the refresh lock, so a reader that
/// gives up (request timeout, client disconnect) does not abort the fetch;
/// the result is stored for whoever asks next.
pub struct DataCache {
    source: Arc<dyn CatalogSource>,
    tables: Arc<PropertyTables>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: Arc<RwLock<Option<Arc<Snapshot>>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl DataCache {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            tables: Arc::new(PropertyTables::default()),
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
            snapshot: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tables(mut self, tables: PropertyTables) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn tables(&self) -> &PropertyTables {
        &self.tables
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        // A clock that moved backwards yields a negative age; keep the snapshot.
        (self.clock.now() - snapshot.fetched_at)
            .to_std()
            .map_or(true, |age| age < self.ttl)
    }

    async fn current_fresh(&self) -> Option<Arc<Snapshot>> {
        let guard = self.snapshot.read().await;
        guard
            .as_ref()
            .filter(|snapshot| self.is_fresh(snapshot))
            .cloned()
    }

    pub async fn get(&self) -> Arc<Snapshot> {
        if let Some(snapshot) = self.current_fresh().await {
            metrics::inc_cache_lookup(CACHE_RESULT_HIT);
            return snapshot;
        }
        metrics::inc_cache_lookup(CACHE_RESULT_MISS);

        let guard = Arc::clone(&self.refresh_lock).lock_owned().await;
        if let Some(snapshot) = self.current_fresh().await {
            return snapshot;
        }
        self.rebuild(guard).await
    }

    /// Rebuilds unconditionally.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let guard = Arc::clone(&self.refresh_lock).lock_owned().await;
        self.rebuild(guard).await
    }

    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
        tracing::info!("catalog cache cleared");
    }

    pub async fn state(&self) -> CacheState {
        match self.snapshot.read().await.as_ref() {
            None => CacheState::Empty,
            Some(snapshot) if self.is_fresh(snapshot) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    async fn rebuild(&self, guard: OwnedMutexGuard<()>) -> Arc<Snapshot> {
        let job = Rebuild {
            source: Arc::clone(&self.source),
            tables: Arc::clone(&self.tables),
            clock: Arc::clone(&self.clock),
            snapshot: Arc::clone(&self.snapshot),
        };
        let task = tokio::spawn(async move {
            let snapshot = job.run().await;
            drop(guard);
            snapshot
        });
        match task.await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "catalog rebuild task failed; serving fallback directory");
                Arc::new(fallback::snapshot(self.clock.now()))
            }
        }
    }
}

struct Rebuild {
    source: Arc<dyn CatalogSource>,
    tables: Arc<PropertyTables>,
    clock: Arc<dyn Clock>,
    snapshot: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl Rebuild {
    async fn run(self) -> Arc<Snapshot> {
        let snapshot = match self.source.fetch_records().await {
            Ok(records) => {
                let outcome = build_catalog(records, &self.tables);
                outcome.report("catalog");
                let catalog = outcome.value;
                tracing::info!(
                    categories = catalog.categories.len(),
                    links = catalog.links.len(),
                    "catalog rebuilt from upstream"
                );
                Snapshot {
                    categories: catalog.categories,
                    links: catalog.links,
                    fetched_at: self.clock.now(),
                    origin: SnapshotOrigin::Upstream,
                }
            }
            Err(err) => {
                tracing::warn!(
                    kind = err.kind(),
                    error = %err,
                    "catalog upstream failed; serving fallback directory"
                );
                fallback::snapshot(self.clock.now())
            }
        };
        metrics::inc_catalog_refresh(snapshot.origin.as_str());

        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::SourceError;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl FakeSource {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn fetch_records(&self) -> Result<Vec<Value>, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SourceError::Unavailable("boom".into()));
            }
            Ok(vec![json!({
                "id": format!("page-{call}"),
                "properties": {
                    "Name": { "title": [{ "plain_text": format!("Link {call}") }] },
                    "URL": { "url": "https://example.com" },
                    "Category": { "select": { "name": "工具" } }
                }
            })])
        }
    }

    fn cache_with(source: Arc<FakeSource>, clock: Arc<ManualClock>) -> DataCache {
        DataCache::new(source).with_clock(clock)
    }

    #[tokio::test]
    async fn get_serves_snapshot_within_ttl() {
        let source = Arc::new(FakeSource::ok());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(source.clone(), clock.clone());

        assert_eq!(cache.state().await, CacheState::Empty);
        let first = cache.get().await;
        assert_eq!(first.origin, SnapshotOrigin::Upstream);
        assert_eq!(first.links[0].id, "page-1");

        clock.advance(chrono::Duration::seconds(299));
        let second = cache.get().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.state().await, CacheState::Fresh);
    }

    #[tokio::test]
    async fn get_refetches_after_ttl() {
        let source = Arc::new(FakeSource::ok());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(source.clone(), clock.clone());

        cache.get().await;
        clock.advance(chrono::Duration::seconds(300));
        assert_eq!(cache.state().await, CacheState::Stale);

        let snapshot = cache.get().await;
        assert_eq!(snapshot.links[0].id, "page-2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = Arc::new(FakeSource::ok());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(source.clone(), clock);

        cache.get().await;
        cache.invalidate().await;
        assert_eq!(cache.state().await, CacheState::Empty);
        cache.get().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_ignores_ttl() {
        let source = Arc::new(FakeSource::ok());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(source.clone(), clock);

        cache.get().await;
        let refreshed = cache.refresh().await;
        assert_eq!(refreshed.links[0].id, "page-2");
        assert_eq!(cache.get().await.links[0].id, "page-2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failure_stores_fallback_for_the_ttl_window() {
        let source = Arc::new(FakeSource::failing());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(source.clone(), clock.clone());

        let snapshot = cache.get().await;
        assert_eq!(snapshot.origin, SnapshotOrigin::Fallback);
        assert_eq!(snapshot.categories, fallback::categories());
        assert_eq!(snapshot.links, fallback::links());
        assert_eq!(snapshot.fetched_at, clock.now());

        clock.advance(chrono::Duration::seconds(60));
        cache.get().await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_gets_share_one_fetch() {
        let source = Arc::new(FakeSource {
            delay: Duration::from_millis(50),
            ..FakeSource::ok()
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(cache_with(source.clone(), clock));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get().await }));
        }
        for handle in handles {
            let snapshot = handle.await.unwrap();
            assert_eq!(snapshot.links[0].id, "page-1");
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn abandoned_get_still_stores_the_rebuild() {
        let source = Arc::new(FakeSource {
            delay: Duration::from_millis(200),
            ..FakeSource::ok()
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(source.clone(), clock);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), cache.get()).await;
        assert!(abandoned.is_err());

        let snapshot = cache.get().await;
        assert_eq!(snapshot.links[0].id, "page-1");
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.state().await, CacheState::Fresh);
    }

    #[tokio::test]
    async fn custom_tables_drive_extraction() {
        let source = Arc::new(FakeSource::ok());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tables = PropertyTables::from_json(&json!({ "name": ["Nothing"] })).unwrap();
        let cache = cache_with(source, clock).with_tables(tables);

        let snapshot = cache.get().await;
        assert_eq!(snapshot.origin, SnapshotOrigin::Upstream);
        assert!(snapshot.links.is_empty());
        assert!(snapshot.categories.is_empty());
    }
}
