//! Keyed Cache Store Module
//!
//! Main cache engine mapping string keys to TTL-stamped entries, with lazy
//! expiry and substring-pattern invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats};
use crate::clock::{Clock, SystemClock};

// == Keyed Cache Store ==
/// In-memory map from string key to [`CacheEntry`], owned by a single
/// logical cache instance.
///
/// Keys are deterministic strings derived from the logical query (for
/// example `"favorites_" + volunteer_id + "_" + announcement_id`), so a
/// write against one entity can evict every affected query with
/// [`KeyedCacheStore::invalidate_by_pattern`].
///
/// None of the operations fail: they are plain map updates. Expired entries
/// are removed lazily on the next access to their key; callers that want a
/// periodic sweep can use [`KeyedCacheStore::sweep_expired`].
#[derive(Debug)]
pub struct KeyedCacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// TTL in milliseconds applied when `set` is called without one
    default_ttl_ms: u64,
    /// Injected time source
    clock: Arc<dyn Clock>,
}

impl<V> KeyedCacheStore<V> {
    // == Constructors ==
    /// Creates a new store using the system clock.
    ///
    /// # Arguments
    /// * `default_ttl_ms` - TTL applied to entries stored without an explicit TTL
    pub fn new(default_ttl_ms: u64) -> Self {
        Self::with_clock(default_ttl_ms, Arc::new(SystemClock::new()))
    }

    /// Creates a new store with an injected clock.
    pub fn with_clock(default_ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            default_ttl_ms,
            clock,
        }
    }

    // == Set ==
    /// Stores a value under `key` with an optional TTL.
    ///
    /// If the key already exists, the value is overwritten and its TTL window
    /// restarts at the current clock reading.
    ///
    /// # Arguments
    /// * `key` - The key to store under
    /// * `value` - The value to store
    /// * `ttl_ms` - Optional TTL in milliseconds (uses the store default if None)
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl_ms: Option<u64>) {
        let ttl_ms = ttl_ms.unwrap_or(self.default_ttl_ms);
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl_ms);
        self.entries.insert(key.into(), entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves the value stored under `key`, if any.
    ///
    /// Returns `None` for absent keys. An entry whose TTL has elapsed is
    /// removed during the lookup and reported as absent, so a stale value is
    /// never returned.
    pub fn get(&mut self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let now_ms = self.clock.now_ms();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired(now_ms) {
                self.entries.remove(key);
                self.stats.set_total_entries(self.entries.len());
                self.stats.record_expired(1);
                self.stats.record_miss();
                debug!(key, "expired entry removed on access");
                return None;
            }

            let value = entry.value.clone();
            self.stats.record_hit();
            Some(value)
        } else {
            self.stats.record_miss();
            None
        }
    }

    // == Invalidate ==
    /// Removes the entry stored under `key`.
    ///
    /// Returns whether an entry was present; an absent key is a no-op.
    pub fn invalidate(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.stats.record_invalidated(1);
            self.stats.set_total_entries(self.entries.len());
            debug!(key, "entry invalidated");
            true
        } else {
            false
        }
    }

    // == Invalidate By Pattern ==
    /// Removes every entry whose key contains `pattern` as a substring.
    ///
    /// Matching is case-sensitive, exact substring containment; not a glob or
    /// regex. Deliberately over-approximate: evicting every query that
    /// mentions an entity beats serving stale data for one of them.
    ///
    /// An empty pattern is rejected as a no-op, because every key contains
    /// the empty string and a blank id sneaking in here would silently wipe
    /// the whole cache. Use [`KeyedCacheStore::clear`] for that.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_by_pattern(&mut self, pattern: &str) -> usize {
        if pattern.is_empty() {
            warn!("empty invalidation pattern rejected; use clear() to drop every entry");
            return 0;
        }

        let matching: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        let count = matching.len();

        for key in matching {
            self.entries.remove(&key);
        }

        if count > 0 {
            self.stats.record_invalidated(count as u64);
            self.stats.set_total_entries(self.entries.len());
            debug!(pattern, count, "entries invalidated by pattern");
        }

        count
    }

    // == Clear ==
    /// Removes all entries unconditionally.
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        if count > 0 {
            self.stats.record_invalidated(count as u64);
        }
        self.stats.set_total_entries(0);
        debug!(count, "cache cleared");
    }

    // == Sweep Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
        }

        if count > 0 {
            self.stats.record_expired(count as u64);
            self.stats.set_total_entries(self.entries.len());
        }

        count
    }

    // == Contains ==
    /// Checks whether a still-valid entry exists for `key`.
    ///
    /// Unlike [`KeyedCacheStore::get`] this neither removes an expired entry
    /// nor touches the hit/miss counters.
    pub fn contains(&self, key: &str) -> bool {
        let now_ms = self.clock.now_ms();
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now_ms))
            .unwrap_or(false)
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included until
    /// they are swept or touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Counts a caller that joined an in-flight fetch instead of starting
    /// its own.
    pub(crate) fn record_coalesced(&mut self) {
        self.stats.record_coalesced();
    }
}
