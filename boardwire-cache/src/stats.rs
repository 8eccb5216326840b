//! Cache statistics snapshot.

use serde::Serialize;

/// Point-in-time statistics of one [`crate::ResponseCache`].
///
/// Counters are monotonic for the life of the cache; `entry_count` and
/// `pending` reflect the moment the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Resource collection the cache belongs to (e.g. `cards`).
    pub collection: String,
    /// Instance id the cache belongs to.
    pub instance: String,
    /// Reads served from a live entry or by joining an in-flight fetch.
    pub hits: u64,
    /// Reads that started a new upstream fetch.
    pub misses: u64,
    /// Number of live (unexpired) entries at snapshot time.
    pub entry_count: u64,
    /// Number of fetches currently in flight.
    pub pending: u64,
    /// Entries dropped because the cache was at capacity.
    pub evictions: u64,
    /// Fetch results not stored because their key was invalidated in flight.
    pub discarded_writes: u64,
    /// Maximum number of entries.
    pub capacity: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
