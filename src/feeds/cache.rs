/// Short-lived cache in front of a feed provider
use crate::{
    error::DashboardResult,
    feeds::{FeedProvider, FeedResult, SensorFeed, TimeRange},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

type CacheKey = (SensorFeed, TimeRange);

struct CachedFeed {
    result: FeedResult,
    fetched_at: Instant,
}

/// Reuses successful fetches for `ttl`
///
/// Failed fetches are never cached, so a recovered database shows up on the
/// next request. `ping` always goes to the inner provider.
pub struct CachedProvider {
    inner: Arc<dyn FeedProvider>,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CachedFeed>>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn FeedProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Forget every cached result
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Cached results, fresh or not
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, key: &CacheKey, now: Instant) -> Option<FeedResult> {
        self.lock()
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.result.clone())
    }

    fn store(&self, key: CacheKey, result: &FeedResult, now: Instant) {
        if self.ttl.is_zero() || result.error.is_some() {
            return;
        }

        let mut entries = self.lock();
        entries.retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < self.ttl);
        entries.insert(
            key,
            CachedFeed {
                result: result.clone(),
                fetched_at: now,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CachedFeed>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl FeedProvider for CachedProvider {
    async fn fetch(&self, feed: SensorFeed, range: TimeRange) -> FeedResult {
        let key = (feed, range);
        if let Some(hit) = self.cached(&key, Instant::now()) {
            debug!("Serving {} over {} from cache", feed, range);
            return hit;
        }

        let result = self.inner.fetch(feed, range).await;
        self.store(key, &result, Instant::now());
        result
    }

    async fn ping(&self) -> DashboardResult<()> {
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{FieldValue, Observation};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        fetches: AtomicUsize,
        pings: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl FeedProvider for CountingProvider {
        async fn fetch(&self, feed: SensorFeed, _range: TimeRange) -> FeedResult {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return FeedResult::failed(feed, "Database query error");
            }
            FeedResult::ok(
                feed,
                vec![Observation::new(None).with("temperature", FieldValue::Number(24.0))],
            )
        }

        async fn ping(&self) -> DashboardResult<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn cached(ttl: Duration) -> (Arc<CountingProvider>, CachedProvider) {
        let inner = Arc::new(CountingProvider::default());
        let provider = CachedProvider::new(inner.clone(), ttl);
        (inner, provider)
    }

    #[tokio::test]
    async fn test_repeated_fetch_all_hits_cache() {
        let (inner, provider) = cached(Duration::from_secs(30));

        let first = provider.fetch_all(TimeRange::LastHour).await;
        let second = provider.fetch_all(TimeRange::LastHour).await;
        assert_eq!(inner.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(second.len(), 3);
        assert_eq!(first[0].records, second[0].records);
        assert_eq!(provider.len(), 3);

        // A different window is a different key
        provider.fetch(SensorFeed::Environment, TimeRange::Last24Hours).await;
        assert_eq!(inner.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (inner, provider) = cached(Duration::from_secs(30));
        inner.failing.store(true, Ordering::SeqCst);

        provider.fetch(SensorFeed::Security, TimeRange::LastHour).await;
        provider.fetch(SensorFeed::Security, TimeRange::LastHour).await;
        assert_eq!(inner.fetches.load(Ordering::SeqCst), 2);
        assert!(provider.is_empty());

        inner.failing.store(false, Ordering::SeqCst);
        let result = provider.fetch(SensorFeed::Security, TimeRange::LastHour).await;
        assert!(result.error.is_none());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_entries_expire() {
        let (_inner, provider) = cached(Duration::from_secs(30));
        let key = (SensorFeed::Classroom, TimeRange::LastHour);
        let now = Instant::now();
        provider.store(key, &FeedResult::ok(SensorFeed::Classroom, Vec::new()), now);

        assert!(provider.cached(&key, now + Duration::from_secs(29)).is_some());
        assert!(provider.cached(&key, now + Duration::from_secs(30)).is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache_and_ping_passes_through() {
        let (inner, provider) = cached(Duration::ZERO);

        provider.fetch(SensorFeed::Environment, TimeRange::LastHour).await;
        provider.fetch(SensorFeed::Environment, TimeRange::LastHour).await;
        assert_eq!(inner.fetches.load(Ordering::SeqCst), 2);

        provider.ping().await.unwrap();
        provider.ping().await.unwrap();
        assert_eq!(inner.pings.load(Ordering::SeqCst), 2);
    }
}
