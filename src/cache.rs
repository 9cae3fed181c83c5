//! Time-bounded lookup cache used for the provider and genre id tables.
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Duration::hours(DEFAULT_TTL_HOURS))
    }

    /// Returns the cached value for `key`, running `load` when it is missing or expired.
    /// A failed load leaves the previous state untouched.
    pub async fn get_or_refresh<F, Fut>(&self, key: K, load: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        self.get_or_refresh_at(key, Utc::now(), load).await
    }

    async fn get_or_refresh_at<F, Fut>(&self, key: K, now: DateTime<Utc>, load: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        {
            let guard = self.entries.lock().await;
            if let Some(entry) = guard.get(&key) {
                if now - entry.fetched_at < self.ttl {
                    return Ok(entry.value.clone());
                }
            }
        }

        debug!(key = ?key, "cache miss, loading");
        let value = Arc::new(load().await?);
        let mut guard = self.entries.lock().await;
        guard.insert(
            key,
            Entry {
                value: value.clone(),
                fetched_at: now,
            },
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn reuses_value_within_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::with_default_ttl();
        let loads = AtomicUsize::new(0);
        let counter = &loads;
        let now = Utc::now();

        for _ in 0..3 {
            let v = cache
                .get_or_refresh_at("movie", now, || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(*v, 7);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_after_expiry() {
        let cache: TtlCache<&str, u32> = TtlCache::with_default_ttl();
        let start = Utc::now();
        cache
            .get_or_refresh_at("tv", start, || async { Ok(1) })
            .await
            .unwrap();
        let later = start + Duration::hours(25);
        let v = cache
            .get_or_refresh_at("tv", later, || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(*v, 2);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache: TtlCache<&str, u32> = TtlCache::with_default_ttl();
        let err = cache
            .get_or_refresh("movie", || async { Err(anyhow::anyhow!("boom")) })
            .await;
        assert!(err.is_err());
        let v = cache
            .get_or_refresh("movie", || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(*v, 3);
    }
}
