use moka::sync::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Stored value plus the TTL it was inserted with.
#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry `ttl` after its latest `set`; overwrites restart the clock.
struct PerEntryTtl;

impl<V> Expiry<String, Entry<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-wide string-keyed cache with a TTL per entry.
///
/// Expired entries are never returned by [`get`](Self::get) and are reclaimed
/// lazily, or eagerly by [`sweep`](Self::sweep). Capacity is bounded; past it the
/// least useful entries are evicted.
pub struct ExpiringCache<V> {
    inner: Cache<String, Entry<V>>,
}

impl<V> ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Store `value` under `key` until `ttl_secs` from now, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl_secs: u64) {
        self.inner.insert(
            key.into(),
            Entry {
                value,
                ttl: Duration::from_secs(ttl_secs),
            },
        );
    }

    /// Live value for `key`, or `None` on a miss (absent or expired).
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.invalidate(key);
    }

    /// Reclaim expired entries now instead of waiting for lazy maintenance.
    pub fn sweep(&self) {
        self.inner.run_pending_tasks();
    }

    /// Approximate number of stored entries (exact right after a sweep).
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Background task: periodically sweep expired entries out of the cache.
pub async fn cache_maintenance_loop<V>(
    cache: std::sync::Arc<ExpiringCache<V>>,
    interval_secs: u64,
) where
    V: Clone + Send + Sync + 'static,
{
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        cache.sweep();
        tracing::debug!(entries = cache.entry_count(), "cache sweep complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_returns_none() {
        let cache: ExpiringCache<String> = ExpiringCache::new(16);
        assert!(cache.get("nope").is_none());
        assert!(!cache.contains("nope"));
    }

    #[test]
    fn test_set_then_get_within_ttl() {
        let cache = ExpiringCache::new(16);
        cache.set("k", "v".to_string(), 60);
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_falsy_values_are_hits() {
        let counts = ExpiringCache::new(16);
        counts.set("zero", 0u64, 60);
        assert_eq!(counts.get("zero"), Some(0));

        let strings = ExpiringCache::new(16);
        strings.set("empty", String::new(), 60);
        assert_eq!(strings.get("empty").as_deref(), Some(""));

        let flags = ExpiringCache::new(16);
        flags.set("off", false, 60);
        assert_eq!(flags.get("off"), Some(false));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = ExpiringCache::new(16);
        cache.set("k", 1u32, 1);
        assert_eq!(cache.get("k"), Some(1));
        std::thread::sleep(Duration::from_millis(1200));
        assert!(cache.get("k").is_none(), "entry should be dead after ttl");
        assert!(!cache.contains("k"));
    }

    #[test]
    fn test_overwrite_replaces_value_and_resets_ttl() {
        let cache = ExpiringCache::new(16);
        cache.set("k", 1u32, 1);
        cache.set("k", 2u32, 60);
        std::thread::sleep(Duration::from_millis(1200));
        assert_eq!(cache.get("k"), Some(2));
        cache.sweep();
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_expired_key_can_be_recreated() {
        let cache = ExpiringCache::new(16);
        cache.set("k", 1u32, 1);
        std::thread::sleep(Duration::from_millis(1200));
        assert!(cache.get("k").is_none());
        cache.set("k", 3u32, 60);
        assert_eq!(cache.get("k"), Some(3));
        cache.sweep();
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_sweep_reclaims_expired_entries() {
        let cache = ExpiringCache::new(16);
        cache.set("a", 1u32, 1);
        cache.set("b", 2u32, 1);
        cache.set("c", 3u32, 60);
        std::thread::sleep(Duration::from_millis(1200));
        cache.sweep();
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_returned_value_is_a_copy() {
        let cache = ExpiringCache::new(16);
        cache.set("k", vec![1, 2, 3], 60);
        let mut got = cache.get("k").unwrap();
        got.push(4);
        assert_eq!(cache.get("k").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_invalidate() {
        let cache = ExpiringCache::new(16);
        cache.set("k", 1u8, 60);
        cache.invalidate("k");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_concurrent_set_get() {
        let cache = std::sync::Arc::new(ExpiringCache::new(1024));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100u32 {
                        let key = format!("k{}", i % 10);
                        cache.set(key.clone(), t * 1000 + i, 60);
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        cache.sweep();
        assert_eq!(cache.entry_count(), 10);
    }
}
