//! The seam between tool handlers and the client layer.

use std::sync::Arc;

use boardwire_cache::CacheStats;
use boardwire_core::{ClientError, ClientResult};

use crate::discovery::{self, InstanceDetail, InstanceSummary};
use crate::factory::{ClientFactory, ResolvedClient};
use crate::global;

/// What a tool handler receives: the factory plus the discovery and
/// statistics surfaces. Every operation takes the tool's optional instance
/// selector as-is.
#[derive(Debug, Clone)]
pub struct ToolContext {
    factory: Arc<ClientFactory>,
}

impl ToolContext {
    pub fn new(factory: Arc<ClientFactory>) -> Self {
        Self { factory }
    }

    /// Context over the process-wide factory.
    ///
    /// # Errors
    ///
    /// [`ClientError::Internal`] when no factory has been installed.
    pub fn from_global() -> ClientResult<Self> {
        global::factory()
            .map(Self::new)
            .ok_or_else(|| ClientError::Internal("client factory not installed".to_string()))
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    pub fn client(&self, selector: Option<&str>) -> ClientResult<Arc<ResolvedClient>> {
        self.factory.get_client(selector)
    }

    pub async fn list_instances(&self, check_health: bool) -> Vec<InstanceSummary> {
        discovery::list_instances(&self.factory, check_health).await
    }

    pub fn instance_detail(&self, selector: Option<&str>) -> ClientResult<InstanceDetail> {
        discovery::instance_detail(&self.factory, selector)
    }

    /// One snapshot per module per constructed instance.
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        self.factory.cache_stats()
    }
}
