use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::normalize_title;
use crate::models::MovieId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    TitleSearch(String),
    Details(MovieId),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::TitleSearch(query) => write!(f, "search:{}", normalize_title(query)),
            CacheKey::Details(id) => write!(f, "details:{}", id),
        }
    }
}

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CachedValue<V> {
    value: V,
    cached_at: DateTime<Utc>,
}

/// Bounded, least-recently-used memo of provider lookups
///
/// The lock is only held to read or insert, never across `compute`, so two
/// concurrent misses on the same key may both compute. The last insert wins.
pub struct LookupCache<V> {
    entries: Mutex<LruCache<String, CachedValue<V>>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> LookupCache<V> {
    /// Creates a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Expires entries older than `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Retrieves a live value, dropping it if it has expired
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let key = key.to_string();
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(&key) {
            Some(cached) => self.is_expired(cached),
            None => return None,
        };

        if expired {
            entries.pop(&key);
            return None;
        }
        entries.get(&key).map(|cached| cached.value.clone())
    }

    pub async fn insert(&self, key: &CacheKey, value: V) {
        let cached = CachedValue {
            value,
            cached_at: self.clock.now(),
        };
        self.entries.lock().await.put(key.to_string(), cached);
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its
    /// successful output. Errors are returned as-is and never cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            tracing::debug!(key = %key, "Lookup cache hit");
            return Ok(value);
        }

        tracing::debug!(key = %key, "Lookup cache miss");
        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    fn is_expired(&self, cached: &CachedValue<V>) -> bool {
        match self.ttl {
            Some(ttl) => self.clock.now() - cached.cached_at >= ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ManualClock(std::sync::Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn test_cache_key_display_title_search() {
        let key = CacheKey::TitleSearch("  THE MATRIX ".to_string());
        assert_eq!(format!("{}", key), "search:the matrix");
    }

    #[test]
    fn test_cache_key_display_details() {
        let key = CacheKey::Details(MovieId::Tmdb(27205));
        assert_eq!(format!("{}", key), "details:tmdb:27205");
    }

    #[tokio::test]
    async fn test_get_or_compute_runs_once_per_key() {
        let cache: LookupCache<Option<String>> = LookupCache::new(10);
        let calls = AtomicUsize::new(0);

        for query in ["Inception", "inception ", "INCEPTION"] {
            let value = cache
                .get_or_compute(&CacheKey::TitleSearch(query.to_string()), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Some("Inception".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("Inception"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_misses_are_cached() {
        let cache: LookupCache<Option<String>> = LookupCache::new(10);
        let calls = AtomicUsize::new(0);
        let key = CacheKey::TitleSearch("Some Unknown Movie 2024".to_string());

        for _ in 0..2 {
            let value = cache
                .get_or_compute(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(None)
                })
                .await
                .unwrap();
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: LookupCache<Option<String>> = LookupCache::new(10);
        let key = CacheKey::TitleSearch("Heat".to_string());

        let first = cache
            .get_or_compute(&key, || async { Err::<Option<String>, _>("timeout") })
            .await;
        assert_eq!(first, Err("timeout"));
        assert_eq!(cache.len().await, 0);

        let second = cache
            .get_or_compute(&key, || async { Ok::<_, &str>(Some("Heat".to_string())) })
            .await;
        assert_eq!(second, Ok(Some("Heat".to_string())));
    }

    #[tokio::test]
    async fn test_least_recently_used_entry_is_evicted() {
        let cache: LookupCache<u32> = LookupCache::new(2);
        let a = CacheKey::TitleSearch("a".to_string());
        let b = CacheKey::TitleSearch("b".to_string());
        let c = CacheKey::TitleSearch("c".to_string());

        cache.insert(&a, 1).await;
        cache.insert(&b, 2).await;
        // touch `a` so `b` becomes least recently used
        assert_eq!(cache.get(&a).await, Some(1));
        cache.insert(&c, 3).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&a).await, Some(1));
        assert_eq!(cache.get(&b).await, None);
        assert_eq!(cache.get(&c).await, Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_stay_within_capacity() {
        let cache: Arc<LookupCache<String>> = Arc::new(LookupCache::new(8));
        let mut tasks = tokio::task::JoinSet::new();

        for i in 0..64 {
            let cache = cache.clone();
            tasks.spawn(async move {
                let key = CacheKey::TitleSearch(format!("Movie {}", i % 16));
                let expected = format!("movie {}", i % 16);
                let value = cache
                    .get_or_compute(&key, || async move {
                        tokio::task::yield_now().await;
                        Ok::<_, String>(expected)
                    })
                    .await
                    .unwrap();
                assert_eq!(value, format!("movie {}", i % 16));
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        assert!(cache.len().await <= 8);
        for i in 0..16 {
            let key = CacheKey::TitleSearch(format!("Movie {}", i));
            if let Some(value) = cache.get(&key).await {
                assert_eq!(value, format!("movie {}", i));
            }
        }
    }

    #[tokio::test]
    async fn test_ttl_expiry_with_manual_clock() {
        let clock = Arc::new(ManualClock(std::sync::Mutex::new(Utc::now())));
        let cache: LookupCache<u32> = LookupCache::new(10)
            .with_ttl(Duration::seconds(60))
            .with_clock(clock.clone());
        let key = CacheKey::TitleSearch("Heat".to_string());

        cache.insert(&key, 7).await;
        clock.advance(Duration::seconds(59));
        assert_eq!(cache.get(&key).await, Some(7));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        tokio_test::block_on(async {
            let cache: LookupCache<u32> = LookupCache::new(0);
            cache.insert(&CacheKey::TitleSearch("a".to_string()), 1).await;
            cache.insert(&CacheKey::TitleSearch("b".to_string()), 2).await;
            assert_eq!(cache.len().await, 1);
        });
    }
}
