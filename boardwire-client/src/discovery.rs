//! Instance discovery for the tool layer.
//!
//! Both operations are pure reads of registry and factory state. Neither
//! constructs a client nor touches a module cache; the health check talks
//! to the remote directly.

use std::time::Duration;

use boardwire_core::{ApiRequest, ClientError, ClientResult, InstanceConfig};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::factory::ClientFactory;
use crate::instance::ConfigSource;

/// Upper bound for one health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstanceHealth {
    Healthy,
    Unreachable { reason: String },
    NotConfigured { reason: String },
}

impl InstanceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub id: String,
    pub display_name: String,
    pub tags: Vec<String>,
    pub is_default: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<InstanceHealth>,
}

/// Full non-secret view of one instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDetail {
    #[serde(flatten)]
    pub config: InstanceConfig,
    pub is_default: bool,
    pub token_present: bool,
    pub client_constructed: bool,
    pub source: ConfigSource,
}

/// Every configured instance in declaration order, optionally health-checked.
///
/// Checks run concurrently; each is bounded by [`HEALTH_CHECK_TIMEOUT`].
pub async fn list_instances(factory: &ClientFactory, check_health: bool) -> Vec<InstanceSummary> {
    let registry = factory.registry();
    let default_id = registry.default_id();

    let summaries = registry.instances().iter().map(move |config| async move {
        let health = if check_health {
            Some(self::check_health(factory, config).await)
        } else {
            None
        };
        InstanceSummary {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            tags: config.tags.clone(),
            is_default: config.id == default_id,
            read_only: config.read_only,
            health,
        }
    });
    join_all(summaries).await
}

/// Detail of the instance `id` resolves to (the default when `None`).
pub fn instance_detail(factory: &ClientFactory, id: Option<&str>) -> ClientResult<InstanceDetail> {
    let registry = factory.registry();
    let config = registry.resolve(id)?;
    Ok(InstanceDetail {
        is_default: config.id == registry.default_id(),
        token_present: factory.token_present(&config),
        client_constructed: factory.is_constructed(&config.id),
        source: registry.source().clone(),
        config: config.as_ref().clone(),
    })
}

async fn check_health(factory: &ClientFactory, config: &InstanceConfig) -> InstanceHealth {
    let transport = match factory.health_check_transport(config) {
        Ok(transport) => transport,
        Err(err) => {
            return InstanceHealth::NotConfigured {
                reason: err.to_string(),
            }
        }
    };

    let check = transport.execute(ApiRequest::get("/me"));
    let health = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check).await {
        Ok(Ok(_)) => InstanceHealth::Healthy,
        Ok(Err(ClientError::Config(err))) => InstanceHealth::NotConfigured {
            reason: err.to_string(),
        },
        Ok(Err(err)) => InstanceHealth::Unreachable {
            reason: err.to_string(),
        },
        Err(_) => InstanceHealth::Unreachable {
            reason: format!("no response within {}s", HEALTH_CHECK_TIMEOUT.as_secs()),
        },
    };
    debug!(instance = %config.id, health = ?health, "Health check finished");
    health
}
