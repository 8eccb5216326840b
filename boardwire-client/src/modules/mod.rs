//! Resource modules of one resolved instance.
//!
//! Each module owns exactly one [`ResponseCache`] for its collection. Reads
//! go through the cache; writes check the instance's read-only flag before
//! any request and invalidate the module's collection once they succeed.

/// Shared accessors every module exposes.
macro_rules! module_accessors {
    ($module:ty) => {
        impl $module {
            /// Cache statistics of this module.
            pub fn cache_stats(&self) -> boardwire_cache::CacheStats {
                self.core.stats()
            }

            /// The module's cache.
            pub fn cache(&self) -> &boardwire_cache::ResponseCache<serde_json::Value> {
                self.core.cache()
            }

            /// Drop every cached read of this module's collection.
            pub fn invalidate(&self) -> usize {
                self.core.invalidate_collection()
            }
        }
    };
}
pub(crate) use module_accessors;

pub mod boards;
pub mod cards;
pub mod users;
pub mod workspaces;

pub use boards::Boards;
pub use cards::{Cards, UpdateOutcome};
pub use users::Users;
pub use workspaces::Workspaces;

use std::sync::Arc;

use boardwire_cache::{CacheStats, KeyPattern, ResponseCache};
use boardwire_core::{ApiRequest, ClientError, ClientResult, InstanceConfig, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::settings::ClientSettings;

/// Instance-bound access to the remote API, shared by the modules.
#[derive(Clone)]
pub(crate) struct Remote {
    instance: Arc<InstanceConfig>,
    transport: Arc<dyn Transport>,
}

impl Remote {
    pub(crate) fn new(instance: Arc<InstanceConfig>, transport: Arc<dyn Transport>) -> Self {
        Self {
            instance,
            transport,
        }
    }

    pub(crate) fn instance(&self) -> &InstanceConfig {
        &self.instance
    }

    /// Execute `request` and strip the `{"data": ...}` envelope.
    pub(crate) async fn fetch(&self, request: ApiRequest) -> ClientResult<Value> {
        self.transport.execute(request).await.map(unwrap_envelope)
    }

    pub(crate) async fn read<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        decode(self.fetch(request).await?)
    }

    /// Fail with [`ClientError::ReadOnly`] before anything is sent when the
    /// instance does not accept writes.
    pub(crate) fn ensure_writable(&self, operation: &str) -> ClientResult<()> {
        if self.instance.read_only {
            return Err(ClientError::ReadOnly {
                instance: self.instance.id.clone(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) async fn write<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: ApiRequest,
    ) -> ClientResult<T> {
        self.ensure_writable(operation)?;
        self.read(request).await
    }
}

/// A module's cache plus the remote it fills from.
pub(crate) struct ModuleCore {
    remote: Remote,
    cache: ResponseCache<Value>,
    invalidation: KeyPattern,
}

impl ModuleCore {
    pub(crate) fn new(
        collection: &str,
        remote: Remote,
        settings: &ClientSettings,
        module_ttl: std::time::Duration,
    ) -> Self {
        let cache = ResponseCache::new(
            collection,
            remote.instance().id.clone(),
            settings.cache_config(module_ttl),
        );
        Self {
            remote,
            cache,
            invalidation: KeyPattern::collection(collection),
        }
    }

    pub(crate) fn remote(&self) -> &Remote {
        &self.remote
    }

    pub(crate) fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    pub(crate) fn key(&self, scope: impl std::fmt::Display) -> String {
        self.cache.key(scope)
    }

    /// Read through the cache: `request` is only sent on a miss.
    pub(crate) async fn cached<T: DeserializeOwned>(
        &self,
        key: &str,
        request: ApiRequest,
    ) -> ClientResult<T> {
        let remote = self.remote.clone();
        let value = self
            .cache
            .get(key, move || async move { remote.fetch(request).await })
            .await?;
        decode(value)
    }

    /// Send a write and, once it succeeded, drop every cached read of the
    /// collection (in-flight reads included).
    pub(crate) async fn write<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: ApiRequest,
    ) -> ClientResult<T> {
        let result = self.remote.write(operation, request).await?;
        self.invalidate_collection();
        Ok(result)
    }

    pub(crate) fn invalidate_collection(&self) -> usize {
        let removed = self.cache.invalidate_matching(&self.invalidation);
        debug!(
            instance = %self.remote.instance().id,
            collection = %self.cache.collection(),
            removed,
            "Collection invalidated after write"
        );
        removed
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Strip the `{"data": ...}` envelope the remote wraps bodies in.
pub(crate) fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::decode(e.to_string()))
}
