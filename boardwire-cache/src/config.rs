//! Per-cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Configuration for one [`crate::ResponseCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when a read does not pass its own. Zero disables storage
    /// (in-flight deduplication still applies).
    pub default_ttl: Duration,
    /// Maximum number of entries before least-recently-used eviction.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300), // 5 minutes
            max_entries: 1_000,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Keep deduplication but never store results.
    pub fn disabled(self) -> Self {
        self.with_ttl(Duration::ZERO)
    }

    pub fn is_storing(&self) -> bool {
        !self.default_ttl.is_zero()
    }

    pub(crate) fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
