//! Factories wired to in-memory remote APIs.

#![allow(dead_code)]

use std::sync::Arc;

use boardwire_client::{ClientFactory, ClientSettings, InstanceRegistry, MapEnv};
use boardwire_test_utils::fixtures;
use boardwire_test_utils::{InstanceConfig, MockConnector};

/// Registry over `ids`, the first one being the configured default.
pub fn test_registry(ids: &[&str]) -> InstanceRegistry {
    let instances: Vec<InstanceConfig> = ids.iter().map(|id| fixtures::instance(id)).collect();
    InstanceRegistry::from_instances(instances, ids[0]).expect("valid test registry")
}

/// Token variables set for every id.
pub fn tokens_for(ids: &[&str]) -> MapEnv {
    ids.iter()
        .map(|id| (fixtures::token_env(id), format!("{id}-token")))
        .collect()
}

/// Factory whose every instance starts from [`fixtures::seeded_api`].
pub fn seeded_factory(ids: &[&str]) -> (ClientFactory, Arc<MockConnector>) {
    let connector = ids.iter().fold(MockConnector::new(), |connector, id| {
        connector.with_api(*id, fixtures::seeded_api())
    });
    factory_with(test_registry(ids), Arc::new(connector), tokens_for(ids))
}

pub fn factory_with(
    registry: InstanceRegistry,
    connector: Arc<MockConnector>,
    env: MapEnv,
) -> (ClientFactory, Arc<MockConnector>) {
    let factory = ClientFactory::new(registry, ClientSettings::default())
        .with_connector(connector.clone())
        .with_env(Arc::new(env));
    (factory, connector)
}
