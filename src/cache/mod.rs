//! Cache Module
//!
//! Provides keyed in-memory caching with TTL expiration, substring-pattern
//! invalidation and per-key fetch coalescing.

mod entry;
mod fetch;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use fetch::FetchCache;
pub use stats::CacheStats;
pub use store::KeyedCacheStore;

// == Public Constants ==
/// Default entry TTL in milliseconds (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 300_000;
