//! Client Settings
//!
//! Transport and cache policy shared by every instance. Loaded from
//! environment variables with defaults suitable for interactive use.

use std::time::Duration;

use boardwire_cache::CacheConfig;
use boardwire_core::EnvSource;
use tracing::warn;

// ============================================================================
// CLIENT SETTINGS
// ============================================================================

/// Transport and cache settings applied to every constructed client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Per-request timeout enforced by the HTTP transport.
    pub request_timeout: Duration,

    /// When false, every module cache has a zero TTL: concurrent reads are
    /// still deduplicated but nothing is stored.
    pub cache_enabled: bool,

    /// TTL applied to every module instead of its own default.
    pub cache_ttl_override: Option<Duration>,

    /// Maximum entries per module cache.
    pub cache_max_entries: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(30_000),
            cache_enabled: true,
            cache_ttl_override: None,
            cache_max_entries: 1_000,
        }
    }
}

impl ClientSettings {
    /// Read settings from environment variables.
    ///
    /// Environment variables:
    /// - `BOARDWIRE_REQUEST_TIMEOUT_MS`: request timeout (default: 30000)
    /// - `BOARDWIRE_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `BOARDWIRE_CACHE_TTL_SECS`: TTL for every module (default: per module)
    /// - `BOARDWIRE_CACHE_MAX_ENTRIES`: entries per module cache (default: 1000)
    ///
    /// Unparseable values are logged and replaced by the default.
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let defaults = Self::default();

        let request_timeout = parse_var::<u64>(env, "BOARDWIRE_REQUEST_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);

        let cache_enabled = env
            .non_empty("BOARDWIRE_CACHE_ENABLED")
            .map(|s| !matches!(s.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(defaults.cache_enabled);

        let cache_ttl_override =
            parse_var::<u64>(env, "BOARDWIRE_CACHE_TTL_SECS").map(Duration::from_secs);

        let cache_max_entries = parse_var::<usize>(env, "BOARDWIRE_CACHE_MAX_ENTRIES")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.cache_max_entries);

        Self {
            request_timeout,
            cache_enabled,
            cache_ttl_override,
            cache_max_entries,
        }
    }

    /// Cache configuration for a module whose own default TTL is `module_ttl`.
    pub fn cache_config(&self, module_ttl: Duration) -> CacheConfig {
        let ttl = if self.cache_enabled {
            self.cache_ttl_override.unwrap_or(module_ttl)
        } else {
            Duration::ZERO
        };
        CacheConfig::new()
            .with_ttl(ttl)
            .with_max_entries(self.cache_max_entries)
    }
}

fn parse_var<T: std::str::FromStr>(env: &dyn EnvSource, name: &str) -> Option<T> {
    let raw = env.non_empty(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}
