//! Fetch Cache - a keyed in-memory TTL cache with request coalescing
//!
//! Serves fresh values from memory, collapses concurrent misses for the same
//! key into a single fetch, and evicts entries by TTL or by key-substring
//! invalidation. One [`FetchCache`] instance per logical domain keeps values
//! typed and scopes invalidation patterns to that domain's keys.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, FetchCache, KeyedCacheStore, DEFAULT_TTL_MS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::FetchError;
pub use tasks::spawn_sweep_task;
