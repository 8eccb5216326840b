//! Response cache with TTL, in-flight deduplication and pattern invalidation.
//!
//! The entry store and the in-flight table live behind one mutex so that
//! "look up, else join, else start" is a single atomic step. The mutex is
//! never held across an await point.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use boardwire_core::{ClientError, ClientResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::pattern::KeyPattern;
use crate::stats::CacheStats;

/// Awaitable handle shared by every caller of one in-flight fetch.
type SharedFetch<V> = Shared<BoxFuture<'static, ClientResult<V>>>;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// An outstanding fetch. `generation` identifies which fetch owns the slot,
/// so a fetch started before an invalidation cannot settle a slot created
/// after it.
struct PendingRequest<V> {
    generation: u64,
    handle: SharedFetch<V>,
}

struct CacheState<V> {
    entries: LruCache<String, CacheEntry<V>>,
    pending: HashMap<String, PendingRequest<V>>,
    next_generation: u64,
}

struct CacheInner<V> {
    collection: String,
    instance: String,
    config: CacheConfig,
    state: Mutex<CacheState<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    discarded_writes: AtomicU64,
}

impl<V: Clone> CacheInner<V> {
    /// Cache bookkeeping must never fail an operation, so a poisoned lock is
    /// recovered rather than propagated.
    fn lock_state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of the fetch identified by `generation`.
    fn settle(&self, key: &str, generation: u64, result: &ClientResult<V>, ttl: Duration) {
        let mut state = self.lock_state();
        let owns_slot = state
            .pending
            .get(key)
            .is_some_and(|pending| pending.generation == generation);

        if !owns_slot {
            if result.is_ok() {
                self.discarded_writes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    collection = %self.collection,
                    instance = %self.instance,
                    key,
                    "Discarding fetch result invalidated while in flight"
                );
            }
            return;
        }

        state.pending.remove(key);

        match result {
            Ok(value) if !ttl.is_zero() => {
                let Some(expires_at) = Instant::now().checked_add(ttl) else {
                    warn!(
                        collection = %self.collection,
                        instance = %self.instance,
                        key,
                        ttl_secs = ttl.as_secs(),
                        "TTL out of range, result not cached"
                    );
                    return;
                };
                let entry = CacheEntry {
                    value: value.clone(),
                    expires_at,
                };
                if let Some((evicted, _)) = state.entries.push(key.to_string(), entry) {
                    if evicted != key {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            collection = %self.collection,
                            instance = %self.instance,
                            evicted = %evicted,
                            "Evicted least recently used entry"
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                debug!(
                    collection = %self.collection,
                    instance = %self.instance,
                    key,
                    error = %err,
                    "Fetch failed, nothing cached"
                );
            }
        }
    }

    /// Free the slot of a fetch that ended without settling (panic or runtime
    /// shutdown).
    fn abandon(&self, key: &str, generation: u64) {
        let mut state = self.lock_state();
        let owns_slot = state
            .pending
            .get(key)
            .is_some_and(|pending| pending.generation == generation);
        if owns_slot {
            state.pending.remove(key);
            warn!(
                collection = %self.collection,
                instance = %self.instance,
                key,
                "Fetch ended without a result; pending slot released"
            );
        }
    }
}

/// Releases the pending slot when the fetch task ends, whatever the outcome.
struct PendingGuard<V: Clone> {
    inner: Arc<CacheInner<V>>,
    key: String,
    generation: u64,
    armed: bool,
}

impl<V: Clone> PendingGuard<V> {
    fn settle(&mut self, result: &ClientResult<V>, ttl: Duration) {
        self.armed = false;
        self.inner.settle(&self.key, self.generation, result, ttl);
    }
}

impl<V: Clone> Drop for PendingGuard<V> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon(&self.key, self.generation);
        }
    }
}

enum Lookup<V> {
    Hit(V),
    InFlight(SharedFetch<V>),
    Failed(ClientError),
}

/// Cache for one resource collection of one instance.
///
/// Cloning is cheap and yields a handle to the same cache.
///
/// Fetches run on their own Tokio task: a caller that stops awaiting `get`
/// does not cancel the fetch, and the result is still stored for later
/// callers.
pub struct ResponseCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        collection: impl Into<String>,
        instance: impl Into<String>,
        config: CacheConfig,
    ) -> Self {
        let capacity = config.capacity();
        Self {
            inner: Arc::new(CacheInner {
                collection: collection.into(),
                instance: instance.into(),
                config,
                state: Mutex::new(CacheState {
                    entries: LruCache::new(capacity),
                    pending: HashMap::new(),
                    next_generation: 0,
                }),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                discarded_writes: AtomicU64::new(0),
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    pub fn instance(&self) -> &str {
        &self.inner.instance
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Build a key in this cache's collection namespace.
    pub fn key(&self, scope: impl Display) -> String {
        format!("{}:{}", self.inner.collection, scope)
    }

    /// Read `key`, fetching it with the default TTL on a miss.
    pub async fn get<F, Fut>(&self, key: &str, fetcher: F) -> ClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<V>> + Send + 'static,
    {
        self.get_with_ttl(key, None, fetcher).await
    }

    /// Read `key`, fetching it on a miss and storing the result for `ttl`
    /// (or the configured default).
    ///
    /// `fetcher` is only invoked when neither a live entry nor an in-flight
    /// fetch exists for `key`. A fetch error reaches every joined caller and
    /// is never cached.
    pub async fn get_with_ttl<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetcher: F,
    ) -> ClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<V>> + Send + 'static,
    {
        match self.lookup(key, ttl, fetcher) {
            Lookup::Hit(value) => Ok(value),
            Lookup::InFlight(handle) => handle.await,
            Lookup::Failed(err) => Err(err),
        }
    }

    fn lookup<F, Fut>(&self, key: &str, ttl: Option<Duration>, fetcher: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<V>> + Send + 'static,
    {
        let inner = &self.inner;
        let found = self.find(&mut inner.lock_state(), key);
        if let Some(found) = found {
            return found;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Lookup::Failed(ClientError::Internal(
                "response cache used outside a Tokio runtime".to_string(),
            ));
        };

        // The fetcher may touch this cache, so it runs without the lock.
        let fetch = fetcher();

        let mut state = inner.lock_state();
        if let Some(found) = self.find(&mut state, key) {
            // Another caller started or finished a fetch meanwhile; `fetch`
            // is dropped unpolled.
            return found;
        }

        inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!(collection = %inner.collection, instance = %inner.instance, key, "Cache miss");

        let generation = state.next_generation;
        state.next_generation = generation.wrapping_add(1);
        let ttl = ttl.unwrap_or(inner.config.default_ttl);

        let mut guard = PendingGuard {
            inner: Arc::clone(inner),
            key: key.to_string(),
            generation,
            armed: true,
        };
        // The task cannot settle before the slot below is published because
        // settling takes this same lock.
        let task = runtime.spawn(async move {
            let result = fetch.await;
            guard.settle(&result, ttl);
            result
        });

        let handle = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(ClientError::Internal(format!("cache fetch task failed: {err}"))),
            }
        }
        .boxed()
        .shared();

        state.pending.insert(
            key.to_string(),
            PendingRequest {
                generation,
                handle: handle.clone(),
            },
        );
        Lookup::InFlight(handle)
    }

    /// A live entry or an in-flight fetch for `key`, counted as a hit.
    /// Drops the entry if it has expired.
    fn find(&self, state: &mut CacheState<V>, key: &str) -> Option<Lookup<V>> {
        let inner = &self.inner;
        let now = Instant::now();

        let cached = state
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match cached {
            Some(Some(value)) => {
                inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    collection = %inner.collection,
                    instance = %inner.instance,
                    key,
                    "Cache hit"
                );
                return Some(Lookup::Hit(value));
            }
            Some(None) => {
                state.entries.pop(key);
                debug!(
                    collection = %inner.collection,
                    instance = %inner.instance,
                    key,
                    "Cache entry expired"
                );
            }
            None => {}
        }

        let pending = state.pending.get(key)?;
        inner.hits.fetch_add(1, Ordering::Relaxed);
        debug!(
            collection = %inner.collection,
            instance = %inner.instance,
            key,
            "Joining in-flight fetch"
        );
        Some(Lookup::InFlight(pending.handle.clone()))
    }

    /// Remove every entry and in-flight fetch whose key matches `pattern`.
    ///
    /// See [`KeyPattern::parse`] for the accepted forms. An invalid regular
    /// expression is treated as a literal key. Returns the number of entries
    /// plus in-flight fetches removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let compiled = KeyPattern::parse(pattern).unwrap_or_else(|err| {
            warn!(
                collection = %self.inner.collection,
                pattern,
                error = %err,
                "Invalid invalidation pattern, matching it literally"
            );
            KeyPattern::literal(pattern)
        });
        self.invalidate_matching(&compiled)
    }

    /// Like [`ResponseCache::invalidate`] with a precompiled pattern.
    pub fn invalidate_matching(&self, pattern: &KeyPattern) -> usize {
        let mut state = self.inner.lock_state();

        let doomed: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            state.entries.pop(key.as_str());
        }

        let pending_before = state.pending.len();
        state.pending.retain(|key, _| !pattern.matches(key));
        let removed = doomed.len() + (pending_before - state.pending.len());

        debug!(
            collection = %self.inner.collection,
            instance = %self.inner.instance,
            removed,
            "Invalidated cache keys"
        );
        removed
    }

    /// Drop every entry and in-flight slot.
    pub fn clear(&self) {
        let mut state = self.inner.lock_state();
        state.entries.clear();
        state.pending.clear();
    }

    /// Prune expired entries. Returns how many were removed.
    ///
    /// Reads already evict expired entries lazily, so this is only needed to
    /// reclaim memory held by keys that are never read again.
    pub fn cleanup(&self) -> usize {
        let mut state = self.inner.lock_state();
        let now = Instant::now();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key.as_str());
        }
        expired.len()
    }

    /// Whether a live entry exists for `key`. Does not touch LRU order or
    /// statistics.
    pub fn contains(&self, key: &str) -> bool {
        let state = self.inner.lock_state();
        let now = Instant::now();
        state
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Whether a fetch for `key` is in flight.
    pub fn is_pending(&self, key: &str) -> bool {
        self.inner.lock_state().pending.contains_key(key)
    }

    /// Stored entries, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.inner.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// Snapshot of the counters and current sizes. Expired entries that
    /// have not been pruned yet are not counted.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let (entry_count, pending, capacity) = {
            let state = self.inner.lock_state();
            (
                state.entries.iter().filter(|(_, entry)| entry.is_live(now)).count() as u64,
                state.pending.len() as u64,
                state.entries.cap().get() as u64,
            )
        };
        CacheStats {
            collection: self.inner.collection.clone(),
            instance: self.inner.instance.clone(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            entry_count,
            pending,
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            discarded_writes: self.inner.discarded_writes.load(Ordering::Relaxed),
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn workspaces() -> ResponseCache<Vec<String>> {
        ResponseCache::new("workspaces", "production", CacheConfig::default())
    }

    fn counted(
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl FnOnce() -> BoxFuture<'static, ClientResult<Vec<String>>> {
        let calls = Arc::clone(calls);
        let value = value.to_string();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(vec![value])
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let cache = workspaces();
        let calls = Arc::new(AtomicUsize::new(0));

        let results =
            join_all((0..5).map(|_| cache.get("workspaces:all", counted(&calls, "alpha")))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), vec!["alpha".to_string()]);
        }
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_live_entry_is_a_hit() {
        let cache = workspaces();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("workspaces:all", counted(&calls, "a")).await.unwrap();
        let again = cache.get("workspaces:all", counted(&calls, "b")).await.unwrap();

        assert_eq!(again, vec!["a".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_exactly_one_new_fetch() {
        let cache = ResponseCache::new(
            "boards",
            "production",
            CacheConfig::default().with_ttl(Duration::from_secs(60)),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("boards:1", counted(&calls, "v1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.get("boards:1", counted(&calls, "unused")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        let refreshed = cache.get("boards:1", counted(&calls, "v2")).await.unwrap();
        assert_eq!(refreshed, vec!["v2".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let cached = cache.get("boards:1", counted(&calls, "v3")).await.unwrap();
        assert_eq!(cached, vec!["v2".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_ttl_overrides_default() {
        let cache = workspaces();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_with_ttl("workspaces:all", Some(Duration::from_secs(1)), counted(&calls, "a"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.contains("workspaces:all"));

        cache
            .get_with_ttl("workspaces:all", Some(Duration::ZERO), counted(&calls, "b"))
            .await
            .unwrap();
        assert!(!cache.contains("workspaces:all"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached_and_releases_slot() {
        let cache = workspaces();

        let err = cache
            .get("workspaces:all", || async {
                Err(ClientError::upstream(Some(502), "bad gateway"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(cache.pending_len(), 0);
        assert!(cache.is_empty());

        let calls = Arc::new(AtomicUsize::new(0));
        let value = cache.get("workspaces:all", counted(&calls, "ok")).await.unwrap();
        assert_eq!(value, vec!["ok".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_joined_caller() {
        let cache = workspaces();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..3).map(|_| {
            let calls = Arc::clone(&calls);
            cache.get("workspaces:all", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Err::<Vec<String>, _>(ClientError::upstream(None, "connection reset"))
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.is_err()));
        assert_eq!(cache.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_discards_result() {
        let cache = workspaces();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get("workspaces:all", move || async move {
                        let _ = release_rx.await;
                        Ok(vec!["stale".to_string()])
                    })
                    .await
            })
        };

        while !cache.is_pending("workspaces:all") {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.invalidate("^workspaces:"), 1);
        assert!(!cache.is_pending("workspaces:all"));

        release_tx.send(()).unwrap();
        let value = first.await.unwrap().unwrap();
        assert_eq!(value, vec!["stale".to_string()]);
        assert!(!cache.contains("workspaces:all"));
        assert_eq!(cache.stats().discarded_writes, 1);

        let calls = Arc::new(AtomicUsize::new(0));
        let fresh = cache.get("workspaces:all", counted(&calls, "fresh")).await.unwrap();
        assert_eq!(fresh, vec!["fresh".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_fetch_does_not_clear_newer_slot() {
        let cache = workspaces();
        let (old_tx, old_rx) = oneshot::channel::<()>();
        let (new_tx, new_rx) = oneshot::channel::<()>();

        let old = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get("workspaces:all", move || async move {
                        let _ = old_rx.await;
                        Ok(vec!["old".to_string()])
                    })
                    .await
            })
        };
        while !cache.is_pending("workspaces:all") {
            tokio::task::yield_now().await;
        }
        cache.invalidate("workspaces:all");

        let new = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get("workspaces:all", move || async move {
                        let _ = new_rx.await;
                        Ok(vec!["new".to_string()])
                    })
                    .await
            })
        };
        while !cache.is_pending("workspaces:all") {
            tokio::task::yield_now().await;
        }

        old_tx.send(()).unwrap();
        assert_eq!(old.await.unwrap().unwrap(), vec!["old".to_string()]);
        assert!(cache.is_pending("workspaces:all"));
        assert!(!cache.contains("workspaces:all"));

        new_tx.send(()).unwrap();
        assert_eq!(new.await.unwrap().unwrap(), vec!["new".to_string()]);
        assert!(cache.contains("workspaces:all"));
    }

    #[tokio::test]
    async fn test_abandoned_caller_still_populates_cache() {
        let cache = workspaces();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let caller = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get("workspaces:all", move || async move {
                        let _ = release_rx.await;
                        Ok(vec!["kept".to_string()])
                    })
                    .await
            })
        };
        while !cache.is_pending("workspaces:all") {
            tokio::task::yield_now().await;
        }
        caller.abort();
        let _ = caller.await;

        release_tx.send(()).unwrap();
        while cache.is_pending("workspaces:all") {
            tokio::task::yield_now().await;
        }
        assert!(cache.contains("workspaces:all"));
    }

    #[tokio::test]
    async fn test_invalidate_only_touches_matching_keys() {
        let cache = workspaces();
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["workspaces:all", "workspaces:1", "workspaces:2"] {
            cache.get(key, counted(&calls, key)).await.unwrap();
        }

        assert_eq!(cache.invalidate("workspaces:1"), 1);
        assert!(!cache.contains("workspaces:1"));
        assert!(cache.contains("workspaces:all"));
        assert!(cache.contains("workspaces:2"));

        assert_eq!(cache.invalidate("workspaces:*"), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_prunes_expired_and_is_idempotent() {
        let cache = ResponseCache::new(
            "cards",
            "production",
            CacheConfig::default().with_ttl(Duration::from_secs(10)),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get("cards:1", counted(&calls, "1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get("cards:2", counted(&calls, "2")).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.cleanup(), 1);
        let after_first = cache.stats();
        assert_eq!(cache.cleanup(), 0);
        assert_eq!(cache.stats(), after_first);
        assert!(cache.contains("cards:2"));
    }

    #[tokio::test]
    async fn test_lru_eviction_bounds_entries() {
        let cache = ResponseCache::new(
            "cards",
            "production",
            CacheConfig::default().with_max_entries(2),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get("cards:a", counted(&calls, "a")).await.unwrap();
        cache.get("cards:b", counted(&calls, "b")).await.unwrap();
        // Touch `a` so `b` becomes least recently used.
        cache.get("cards:a", counted(&calls, "unused")).await.unwrap();
        cache.get("cards:c", counted(&calls, "c")).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("cards:a"));
        assert!(!cache.contains("cards:b"));
        assert!(cache.contains("cards:c"));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().capacity, 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_still_deduplicates() {
        let cache = ResponseCache::new("users", "production", CacheConfig::default().disabled());
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..4).map(|_| cache.get("users:all", counted(&calls, "u")))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        cache.get("users:all", counted(&calls, "u")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stats_reads_do_not_change_state() {
        let cache = workspaces();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get("workspaces:all", counted(&calls, "a")).await.unwrap();

        let first = cache.stats();
        let second = cache.stats();
        assert_eq!(first, second);
        assert_eq!(first.collection, "workspaces");
        assert_eq!(first.instance, "production");
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_returns_value_without_caching() {
        let cache: ResponseCache<u32> = ResponseCache::new(
            "workspaces",
            "production",
            CacheConfig::default().with_ttl(Duration::from_secs(u64::MAX)),
        );

        let value = cache.get("workspaces:all", || async { Ok(7) }).await;
        assert_eq!(value, Ok(7));
        assert!(!cache.contains("workspaces:all"));
        assert_eq!(cache.pending_len(), 0);

        let value = cache
            .get_with_ttl("workspaces:1", Some(Duration::MAX), || async { Ok(8) })
            .await;
        assert_eq!(value, Ok(8));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fetcher_may_read_its_own_cache() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let result = runtime.block_on(async {
                let cache: ResponseCache<u64> =
                    ResponseCache::new("workspaces", "production", CacheConfig::default());
                let observer = cache.clone();
                cache
                    .get("workspaces:all", move || {
                        let seen = observer.stats().misses + observer.len() as u64;
                        observer.invalidate("^boards:");
                        async move { Ok(seen) }
                    })
                    .await
            });
            let _ = tx.send(result);
        });

        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("fetch did not complete");
        assert_eq!(result, Ok(0));
    }

    #[tokio::test]
    async fn test_panicking_fetcher_leaves_no_slot_behind() {
        let cache: ResponseCache<u32> =
            ResponseCache::new("workspaces", "production", CacheConfig::default());

        let panicking = cache.clone();
        let outcome = tokio::spawn(async move {
            panicking
                .get("workspaces:all", || -> std::future::Ready<ClientResult<u32>> {
                    panic!("fetcher failed to build its request")
                })
                .await
        })
        .await;
        assert!(outcome.is_err());

        assert_eq!(cache.pending_len(), 0);
        let value = cache.get("workspaces:all", || async { Ok(3) }).await;
        assert_eq!(value, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_count_only_live_entries() {
        let cache = ResponseCache::new(
            "cards",
            "production",
            CacheConfig::default().with_ttl(Duration::from_secs(10)),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get("cards:1", counted(&calls, "1")).await.unwrap();
        assert_eq!(cache.stats().entry_count, 1);

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.stats().entry_count, 0);
        assert_eq!(cache.len(), 1);
        cache.cleanup();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_key_is_namespaced_by_collection() {
        let cache: ResponseCache<u32> =
            ResponseCache::new("boards", "production", CacheConfig::default());
        assert_eq!(cache.key(7), "boards:7");
        assert_eq!(cache.key("list:all"), "boards:list:all");
    }
}
