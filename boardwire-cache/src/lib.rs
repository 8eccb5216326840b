//! Response cache for remote resource collections.
//!
//! Each resource module (workspaces, boards, cards, users) of each backend
//! instance owns its own [`ResponseCache`]. Nothing in this crate is global:
//! isolation between instances comes from the fact that two instances never
//! hold the same cache object.
//!
//! # Contract
//!
//! - A live entry is returned as-is and counted as a hit.
//! - A key with a fetch already in flight joins that fetch (also a hit).
//!   At most one fetch per key is ever outstanding.
//! - Otherwise the fetch runs once, its result is stored for the TTL, and the
//!   pending slot is cleared whether the fetch succeeded or not.
//! - [`ResponseCache::invalidate`] removes matching entries *and* matching
//!   in-flight fetches. A fetch whose slot was invalidated still answers its
//!   callers but never writes into the cache.
//!
//! # Key Naming
//!
//! Keys are `<collection>:<scope>`, e.g. `workspaces:all` or `cards:42`, so a
//! pattern such as `^cards:` targets one collection without touching others.
//! Use [`ResponseCache::key`] to build them.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResponseCache::new("workspaces", "production", CacheConfig::default());
//!
//! let all = cache
//!     .get(&cache.key("all"), move || async move { api.list_workspaces().await })
//!     .await?;
//!
//! // After a write
//! cache.invalidate("^workspaces:");
//! ```

pub mod config;
pub mod pattern;
pub mod response;
pub mod stats;

pub use config::CacheConfig;
pub use pattern::KeyPattern;
pub use response::ResponseCache;
pub use stats::CacheStats;
