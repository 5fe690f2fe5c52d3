//! Time-bounded caches with serve-stale fallback.
//!
//! An entry is fresh while `now - fetched_at < ttl`. Reads of a fresh entry
//! never touch the venue. Reads of a missing or expired entry fetch live; if
//! that fetch fails, an expired entry is served instead. Only a cold key with
//! a failed fetch is an error.

use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use hypebot_core::{Balance, Market, OpenOrder, Pair, Position, Ticker};
use hypebot_telemetry::Metrics;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ExchangeResult;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Keyed TTL cache.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached value if still fresh.
    pub fn fresh(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// Cached value regardless of age.
    pub fn any(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh value, else a live fetch, else the expired value.
    ///
    /// `resource` labels logs and metrics.
    pub async fn get_or_refresh<F, Fut>(&self, key: K, resource: &str, fetch: F) -> ExchangeResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExchangeResult<V>>,
    {
        if let Some(value) = self.fresh(&key) {
            return Ok(value);
        }

        match fetch().await {
            Ok(value) => {
                debug!(resource, "Cache refreshed");
                self.insert(key, value.clone());
                Ok(value)
            }
            Err(e) => {
                Metrics::cache_fetch_failed(resource);
                match self.any(&key) {
                    Some(stale) => {
                        warn!(resource, error = %e, "Live fetch failed, serving stale value");
                        Metrics::cache_stale_served(resource);
                        Ok(stale)
                    }
                    None => Err(e),
                }
            }
        }
    }
}

/// One generation of every facade cache.
///
/// Invalidation swaps in a new generation instead of clearing entries, so a
/// fetch that started before the swap can only write into the old one.
#[derive(Debug)]
pub struct CacheGeneration {
    pub markets: TtlCache<(), Vec<Market>>,
    pub tickers: TtlCache<Pair, Ticker>,
    pub balance: TtlCache<(), Balance>,
    pub positions: TtlCache<(), Vec<Position>>,
    pub open_orders: TtlCache<Pair, Vec<OpenOrder>>,
}

impl CacheGeneration {
    pub fn new(ttl: Duration) -> Self {
        Self {
            markets: TtlCache::new(ttl),
            tickers: TtlCache::new(ttl),
            balance: TtlCache::new(ttl),
            positions: TtlCache::new(ttl),
            open_orders: TtlCache::new(ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    fn failing() -> impl Future<Output = ExchangeResult<u32>> {
        async { Err(ExchangeError::MarketData("venue down".to_string())) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_fetch() {
        let cache: TtlCache<(), u32> = TtlCache::new(TTL);
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let value = cache
                .get_or_refresh((), "test", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let cache: TtlCache<(), u32> = TtlCache::new(TTL);
        cache.insert((), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.fresh(&()), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.fresh(&()), None);

        let value = cache
            .get_or_refresh((), "test", || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(cache.fresh(&()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_serves_stale_when_fetch_fails() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        cache.insert("collateral", 1000);

        tokio::time::advance(Duration::from_secs(120)).await;

        let value = cache
            .get_or_refresh("collateral", "test", failing)
            .await
            .unwrap();
        assert_eq!(value, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_cache_failure_is_error() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        let result = cache.get_or_refresh("collateral", "test", failing).await;
        assert!(matches!(result, Err(ExchangeError::MarketData(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let cache: TtlCache<Pair, u32> = TtlCache::new(TTL);
        cache.insert(Pair::perp("BTC"), 1);

        let eth = cache.get_or_refresh(Pair::perp("ETH"), "test", failing).await;
        assert!(eth.is_err());
        assert_eq!(cache.fresh(&Pair::perp("BTC")), Some(1));
        assert_eq!(cache.len(), 1);
    }
}
