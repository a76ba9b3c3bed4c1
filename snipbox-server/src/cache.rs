//! Short-lived "remember" cache
//!
//! Values are stored as JSON so one cache can hold differently typed
//! results under fixed string keys. Concurrent misses on the same key
//! may each compute and store; the last write wins.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Default number of remembered entries
const DEFAULT_CAPACITY: u64 = 1_024;

#[async_trait]
pub trait RememberCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// Return the value remembered under `key`, or compute, store for
/// `ttl` and return it. Errors from `compute` are not cached.
pub async fn remember<T, E, F, Fut>(
    cache: &dyn RememberCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(cached) = cache.get(key).await {
        match serde_json::from_value(cached) {
            Ok(value) => {
                tracing::trace!(key, "cache hit");
                return Ok(value);
            }
            Err(e) => tracing::warn!(key, error = %e, "discarding undecodable cache entry"),
        }
    }

    let fresh = compute().await?;
    match serde_json::to_value(&fresh) {
        Ok(value) => cache.put(key, value, ttl).await,
        Err(e) => tracing::warn!(key, error = %e, "value not cacheable"),
    }
    Ok(fresh)
}

#[derive(Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

/// Each entry expires after its own TTL, reset on overwrite.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache backed by moka
#[derive(Clone)]
pub struct MokaCache {
    entries: Cache<String, Entry>,
}

impl MokaCache {
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl RememberCache for MokaCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).await.map(|entry| entry.value)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.insert(key.to_owned(), Entry { value, ttl }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counted(calls: &AtomicUsize) -> Result<usize, std::convert::Infallible> {
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test]
    async fn remembers_within_ttl() {
        let cache = MokaCache::default();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        let first: usize = remember(&cache, "k", ttl, || counted(&calls)).await.unwrap();
        let second: usize = remember(&cache, "k", ttl, || counted(&calls)).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recomputes_after_ttl() {
        let cache = MokaCache::default();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_millis(50);

        let _: usize = remember(&cache, "k", ttl, || counted(&calls)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let again: usize = remember(&cache, "k", ttl, || counted(&calls)).await.unwrap();

        assert_eq!(again, 2);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache = MokaCache::default();
        let ttl = Duration::from_secs(60);

        let a: i64 = remember(&cache, "a", ttl, || async { Ok::<_, ()>(1) }).await.unwrap();
        let b: i64 = remember(&cache, "b", ttl, || async { Ok::<_, ()>(2) }).await.unwrap();

        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = MokaCache::default();
        let ttl = Duration::from_secs(60);

        let failed: Result<i64, &str> = remember(&cache, "k", ttl, || async { Err("down") }).await;
        assert!(failed.is_err());

        let ok: i64 = remember(&cache, "k", ttl, || async { Ok::<_, &str>(5) }).await.unwrap();
        assert_eq!(ok, 5);
    }

    #[tokio::test]
    async fn remembers_absent_values() {
        let cache = MokaCache::default();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            let value: Option<i64> = remember(&cache, "none", ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(None)
            })
            .await
            .unwrap();
            assert!(value.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn put_overwrites_entry() {
        let cache = MokaCache::default();
        cache.put("k", Value::from(1), Duration::from_secs(60)).await;
        cache.put("k", Value::from(2), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(Value::from(2)));
    }
}
