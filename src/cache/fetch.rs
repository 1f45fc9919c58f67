//! Fetch Coalescing Module
//!
//! Async front door of the cache: serves hits straight from the keyed store
//! and collapses concurrent misses for the same key into a single fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheStats, KeyedCacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{FetchError, Result};

/// Handle to an in-flight fetch that any number of callers can await.
type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

/// The store and the in-flight fetch table, guarded together so a settling
/// fetch and an invalidation can never interleave between the two maps.
struct CacheState<V> {
    store: KeyedCacheStore<V>,
    pending: HashMap<String, SharedFetch<V>>,
}

// == Fetch Cache ==
/// A keyed TTL cache that performs at most one concurrent fetch per key.
///
/// On a miss, [`FetchCache::get_or_fetch`] either joins the fetch already in
/// flight for that key or starts a new one; every caller waiting on the same
/// key observes the same eventual result. Successful results are stored
/// through the owned [`KeyedCacheStore`]; failures are never cached, so the
/// next call retries with a fresh fetch.
///
/// Cloning the handle is cheap and shares the same underlying cache. One
/// instance per logical domain (favorites, dashboard stats, ...) keeps the
/// value type concrete and scopes pattern invalidation to that domain's keys.
pub struct FetchCache<V> {
    state: Arc<RwLock<CacheState<V>>>,
}

impl<V> Clone for FetchCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<V> FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache using the system clock.
    ///
    /// # Arguments
    /// * `default_ttl_ms` - TTL applied to entries stored without an explicit TTL
    pub fn new(default_ttl_ms: u64) -> Self {
        Self::with_clock(default_ttl_ms, Arc::new(SystemClock::new()))
    }

    /// Creates a cache with an injected clock.
    pub fn with_clock(default_ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState {
                store: KeyedCacheStore::with_clock(default_ttl_ms, clock),
                pending: HashMap::new(),
            })),
        }
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl_ms)
    }

    // == Get Or Fetch ==
    /// Returns the cached value for `key`, fetching it if necessary.
    ///
    /// On a cache hit the value is returned without suspension. On a miss,
    /// if a fetch for this exact key is already in flight the caller joins
    /// it instead of issuing a second one; otherwise `fetcher` is invoked to
    /// build the fetch future and a detached task drives it to completion,
    /// so the result lands in the cache even if every caller loses interest.
    ///
    /// On success the value is stored under `key` with `ttl_ms` (store
    /// default if None) and returned to every waiter. On failure nothing is
    /// cached, every waiter receives the same [`FetchError`], and a
    /// subsequent call starts over with a fresh fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl_ms: Option<u64>, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let fetch = {
            let mut state = self.state.write().await;

            if let Some(value) = state.store.get(key) {
                return Ok(value);
            }

            if let Some(inflight) = state.pending.get(key).cloned() {
                state.store.record_coalesced();
                debug!(key, "joining in-flight fetch");
                inflight
            } else {
                let fetch: SharedFetch<V> =
                    Self::drive(Arc::clone(&self.state), key.to_owned(), ttl_ms, fetcher())
                        .boxed()
                        .shared();
                state.pending.insert(key.to_owned(), fetch.clone());
                debug!(key, "starting fetch");

                // Detached driver: the fetch settles and populates the cache
                // even when every caller drops its handle mid-flight.
                tokio::spawn(fetch.clone().map(|_| ()));

                fetch
            }
        };

        fetch.await
    }

    /// Runs one fetch to completion and settles the per-key state.
    ///
    /// The pending entry is removed in the same critical section that stores
    /// the result, before any waiter observes it; a failed fetch therefore
    /// never blocks a retry.
    async fn drive<Fut>(
        state: Arc<RwLock<CacheState<V>>>,
        key: String,
        ttl_ms: Option<u64>,
        fetch: Fut,
    ) -> Result<V>
    where
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let outcome = fetch.await;

        let mut state = state.write().await;
        state.pending.remove(&key);

        match outcome {
            Ok(value) => {
                state.store.set(key, value.clone(), ttl_ms);
                Ok(value)
            }
            Err(cause) => {
                debug!(key = %key, "fetch settled with error");
                Err(FetchError::new(key, cause))
            }
        }
    }

    // == Store Pass-Throughs ==
    /// Retrieves the cached value for `key` without fetching.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.state.write().await.store.get(key)
    }

    /// Stores a value under `key` with an optional TTL.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl_ms: Option<u64>) {
        self.state.write().await.store.set(key, value, ttl_ms);
    }

    /// Removes the entry stored under `key`; returns whether one was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.state.write().await.store.invalidate(key)
    }

    /// Removes every entry whose key contains `pattern`; returns the count.
    ///
    /// Called by writers after a successful create/update/delete so later
    /// reads cannot observe stale data for the touched entity.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        self.state.write().await.store.invalidate_by_pattern(pattern)
    }

    /// Removes all entries unconditionally.
    pub async fn clear(&self) {
        self.state.write().await.store.clear();
    }

    /// Removes all expired entries; returns the count.
    pub async fn sweep_expired(&self) -> usize {
        self.state.write().await.store.sweep_expired()
    }

    /// Returns the current number of entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.store.len()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.store.is_empty()
    }

    /// Returns a snapshot of the cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.state.read().await.store.stats()
    }
}
