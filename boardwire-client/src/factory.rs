//! Lazily constructed, per-instance clients.
//!
//! The factory owns the only mutable shared state of the client layer: the
//! map from resolved instance id to its [`ResolvedClient`]. Everything a
//! client holds (transport, module caches, merge coordinator) belongs to that
//! one instance.

use std::sync::Arc;

use boardwire_cache::CacheStats;
use boardwire_core::{
    ClientError, ClientResult, Connector, EnvSource, InstanceConfig, ProcessEnv, Transport,
};
use dashmap::DashMap;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::instance::InstanceRegistry;
use crate::modules::{Boards, Cards, Remote, Users, Workspaces};
use crate::rest::HttpConnector;
use crate::settings::ClientSettings;

// ============================================================================
// RESOLVED CLIENT
// ============================================================================

/// The client bound to one instance: its transport and one cache-owning
/// module per resource collection.
pub struct ResolvedClient {
    config: Arc<InstanceConfig>,
    transport: Arc<dyn Transport>,
    workspaces: Workspaces,
    boards: Boards,
    cards: Cards,
    users: Users,
}

impl std::fmt::Debug for ResolvedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedClient")
            .field("instance", &self.config.id)
            .field("api_url", &self.config.api_url)
            .finish_non_exhaustive()
    }
}

impl ResolvedClient {
    fn new(
        config: Arc<InstanceConfig>,
        transport: Arc<dyn Transport>,
        settings: &ClientSettings,
    ) -> Self {
        let remote = Remote::new(config.clone(), transport.clone());
        Self {
            workspaces: Workspaces::new(remote.clone(), settings),
            boards: Boards::new(remote.clone(), settings),
            cards: Cards::new(remote.clone(), settings),
            users: Users::new(remote, settings),
            config,
            transport,
        }
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &str {
        &self.config.id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn workspaces(&self) -> &Workspaces {
        &self.workspaces
    }

    pub fn boards(&self) -> &Boards {
        &self.boards
    }

    pub fn cards(&self) -> &Cards {
        &self.cards
    }

    pub fn users(&self) -> &Users {
        &self.users
    }

    /// One snapshot per module, in a fixed order.
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        vec![
            self.workspaces.cache_stats(),
            self.boards.cache_stats(),
            self.cards.cache_stats(),
            self.users.cache_stats(),
        ]
    }

    /// Clear every module cache of this instance.
    pub fn invalidate_all(&self) {
        self.workspaces.cache().clear();
        self.boards.cache().clear();
        self.cards.cache().clear();
        self.users.cache().clear();
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Resolves instance selectors and hands out one [`ResolvedClient`] per
/// resolved instance, constructing it on first use.
///
/// Construction failures (a missing token variable, an unusable token) are
/// reported by the first [`ClientFactory::get_client`] for that instance and
/// leave nothing behind, so a later call retries.
pub struct ClientFactory {
    registry: Arc<InstanceRegistry>,
    connector: Arc<dyn Connector>,
    env: Arc<dyn EnvSource>,
    settings: ClientSettings,
    clients: DashMap<String, Arc<ResolvedClient>>,
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("instances", &self.registry.ids())
            .field("constructed", &self.constructed_ids())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ClientFactory {
    /// Factory using the HTTP connector and the process environment.
    pub fn new(registry: InstanceRegistry, settings: ClientSettings) -> Self {
        let connector = HttpConnector::new(settings.request_timeout);
        Self {
            registry: Arc::new(registry),
            connector: Arc::new(connector),
            env: Arc::new(ProcessEnv),
            settings,
            clients: DashMap::new(),
        }
    }

    /// Load registry and settings from the process environment.
    pub fn from_env() -> ClientResult<Self> {
        let registry = InstanceRegistry::from_env()?;
        Ok(Self::new(registry, ClientSettings::from_env(&ProcessEnv)))
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Where tokens are read from at construction time.
    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// The client for `selector` (or the default instance), built on first use.
    ///
    /// Concurrent first calls for one instance converge on a single client:
    /// insertion happens under the map's entry lock.
    pub fn get_client(&self, selector: Option<&str>) -> ClientResult<Arc<ResolvedClient>> {
        let config = self.registry.resolve(selector)?;

        if let Some(existing) = self.clients.get(&config.id) {
            return Ok(existing.clone());
        }

        let client = self
            .clients
            .entry(config.id.clone())
            .or_try_insert_with(|| self.build(config.clone()))?;
        Ok(client.clone())
    }

    fn build(&self, config: Arc<InstanceConfig>) -> ClientResult<Arc<ResolvedClient>> {
        let token = self.token(&config)?;
        let transport = self.connector.connect(&config, token)?;
        let client = ResolvedClient::new(config.clone(), transport, &self.settings);
        info!(
            instance = %config.id,
            api_url = %config.api_url,
            read_only = config.read_only,
            "Client constructed"
        );
        Ok(Arc::new(client))
    }

    fn token(&self, config: &InstanceConfig) -> ClientResult<SecretString> {
        self.env
            .non_empty(&config.token_env)
            .map(|value| SecretString::new(value.into()))
            .ok_or_else(|| ClientError::TokenMissing {
                instance: config.id.clone(),
                env_var: config.token_env.clone(),
            })
    }

    /// Whether the instance's token variable is currently set.
    pub fn token_present(&self, config: &InstanceConfig) -> bool {
        self.env.non_empty(&config.token_env).is_some()
    }

    pub fn is_constructed(&self, instance_id: &str) -> bool {
        self.clients.contains_key(instance_id)
    }

    pub fn constructed(&self, instance_id: &str) -> Option<Arc<ResolvedClient>> {
        self.clients.get(instance_id).map(|entry| entry.clone())
    }

    pub fn constructed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// A transport for a health check.
    ///
    /// Reuses the constructed client's transport when there is one; otherwise
    /// connects a throwaway transport that is not registered, so probing never
    /// constructs a client or its caches.
    pub fn health_check_transport(
        &self,
        config: &InstanceConfig,
    ) -> ClientResult<Arc<dyn Transport>> {
        if let Some(client) = self.constructed(&config.id) {
            return Ok(client.transport().clone());
        }
        let token = self.token(config)?;
        self.connector.connect(config, token)
    }

    /// Cache statistics of every constructed client, ordered by instance id.
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        self.constructed_ids()
            .iter()
            .filter_map(|id| self.constructed(id))
            .flat_map(|client| client.cache_stats())
            .collect()
    }

    /// Drop every constructed client. The next use rebuilds from scratch.
    pub fn reset(&self) {
        let dropped = self.clients.len();
        self.clients.clear();
        debug!(dropped, "Client factory reset");
    }
}
