//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Fetch Error ==
/// Error handed to every caller attached to a failed fetch.
///
/// Wraps whatever error the injected fetcher raised. Cloneable so a single
/// failure can be delivered to any number of coalesced waiters; failures are
/// never stored in the cache, so the next call for the same key retries.
#[derive(Debug, Clone, Error)]
#[error("fetch for key '{key}' failed: {message}")]
pub struct FetchError {
    key: String,
    message: String,
    cause: Arc<anyhow::Error>,
}

impl FetchError {
    /// Wraps a fetcher error for the given key.
    pub(crate) fn new(key: String, cause: anyhow::Error) -> Self {
        Self {
            message: cause.to_string(),
            key,
            cause: Arc::new(cause),
        }
    }

    /// The key whose fetch failed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying error raised by the fetcher.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

// == Result Type Alias ==
/// Convenience Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
