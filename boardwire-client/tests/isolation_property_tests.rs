//! Property tests for instance isolation, selector resolution and
//! read-only enforcement.

use std::sync::Arc;

use boardwire_client::{
    CardFilter, CardUpdate, ClientError, InstanceRegistry, MapEnv, NewCard, NewWorkspace,
    RegistryOptions, ResolvedClient, WorkspaceUpdate,
};
use boardwire_test_utils::assertions::assert_read_only;
use boardwire_test_utils::fixtures::{self, BOARD_ID, LANE_ID, LINKED_CARD_ID, TODO_COLUMN_ID};
use boardwire_test_utils::generators::arb_instance_ids;
use boardwire_test_utils::{InstanceConfig, MockConnector};
use proptest::prelude::*;
use tokio::runtime::Runtime;

#[path = "support/factory.rs"]
mod factory_support;
use factory_support::{factory_with, seeded_factory, tokens_for};

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn fail(err: ClientError) -> TestCaseError {
    TestCaseError::fail(err.to_string())
}

// ============================================================================
// STRATEGIES
// ============================================================================

#[derive(Debug, Clone)]
enum Operation {
    ListWorkspaces,
    GetCard(i64),
    ListCards,
    BoardStructure,
    UpdateCard(String),
    CreateWorkspace(String),
    Invalidate(&'static str),
    Cleanup,
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::ListWorkspaces),
        prop_oneof![Just(100i64), Just(101), Just(102)].prop_map(Operation::GetCard),
        Just(Operation::ListCards),
        Just(Operation::BoardStructure),
        "[A-Za-z]{1,12}".prop_map(Operation::UpdateCard),
        "[A-Za-z]{1,12}".prop_map(Operation::CreateWorkspace),
        prop_oneof![Just("^cards:"), Just("^workspaces:"), Just("*"), Just("boards:10")]
            .prop_map(Operation::Invalidate),
        Just(Operation::Cleanup),
    ]
}

async fn apply(client: &ResolvedClient, operation: &Operation) -> Result<(), ClientError> {
    match operation {
        Operation::ListWorkspaces => client.workspaces().list().await.map(drop),
        Operation::GetCard(id) => client.cards().get(*id).await.map(drop),
        Operation::ListCards => client
            .cards()
            .list(&CardFilter::for_board(BOARD_ID))
            .await
            .map(drop),
        Operation::BoardStructure => client.boards().structure(BOARD_ID).await.map(drop),
        Operation::UpdateCard(title) => client
            .cards()
            .update(
                LINKED_CARD_ID,
                CardUpdate {
                    title: Some(title.clone()),
                    ..CardUpdate::default()
                },
            )
            .await
            .map(drop),
        Operation::CreateWorkspace(name) => client
            .workspaces()
            .create(&NewWorkspace { name: name.clone() })
            .await
            .map(drop),
        Operation::Invalidate(pattern) => {
            client.cards().cache().invalidate(pattern);
            client.workspaces().cache().invalidate(pattern);
            client.boards().cache().invalidate(pattern);
            Ok(())
        }
        Operation::Cleanup => {
            client.cards().cache().cleanup();
            Ok(())
        }
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Nothing done through one instance's client is observable through
    /// another's: statistics, entries and remote traffic stay put.
    #[test]
    fn prop_operations_never_cross_instances(
        warmup in prop::collection::vec(operation_strategy(), 0..4),
        operations in prop::collection::vec(operation_strategy(), 1..12),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (factory, connector) = seeded_factory(&["production", "staging"]);
            let production = factory.get_client(Some("production")).map_err(fail)?;
            let staging = factory.get_client(Some("staging")).map_err(fail)?;

            for operation in &warmup {
                apply(&staging, operation).await.map_err(fail)?;
            }
            let staging_stats = staging.cache_stats();
            let staging_entries: Vec<usize> = vec![
                staging.workspaces().cache().len(),
                staging.boards().cache().len(),
                staging.cards().cache().len(),
            ];
            let staging_requests = connector.api("staging").total_requests();

            for operation in &operations {
                apply(&production, operation).await.map_err(fail)?;
            }

            prop_assert_eq!(staging.cache_stats(), staging_stats);
            prop_assert_eq!(
                vec![
                    staging.workspaces().cache().len(),
                    staging.boards().cache().len(),
                    staging.cards().cache().len(),
                ],
                staging_entries
            );
            prop_assert_eq!(connector.api("staging").total_requests(), staging_requests);
            Ok(())
        })?;
    }

    /// An explicit selector beats the configured default, which beats
    /// nothing at all.
    #[test]
    fn prop_resolution_priority(
        ids in arb_instance_ids(6),
        default_index in any::<prop::sample::Index>(),
        selector_index in any::<prop::sample::Index>(),
    ) {
        let default_id = ids[default_index.index(ids.len())].clone();
        let selected = ids[selector_index.index(ids.len())].clone();
        let instances: Vec<InstanceConfig> = ids.iter().map(|id| fixtures::instance(id)).collect();
        let registry = InstanceRegistry::from_instances(instances, default_id.clone())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(&registry.resolve(Some(selected.as_str())).map_err(fail)?.id, &selected);
        prop_assert_eq!(&registry.resolve(None).map_err(fail)?.id, &default_id);
        prop_assert_eq!(&registry.resolve(Some("")).map_err(fail)?.id, &default_id);

        let unknown = format!("{}-missing", ids.join("-"));
        let is_not_found = matches!(
            registry.resolve(Some(unknown.as_str())),
            Err(ClientError::InstanceNotFound { .. })
        );
        prop_assert!(is_not_found);
    }
}

#[test]
fn test_legacy_singleton_used_without_config_or_selector() {
    let env = MapEnv::new()
        .with("BOARDWIRE_API_URL", "https://legacy.example.com/api")
        .with("BOARDWIRE_API_TOKEN", "t");
    let registry = InstanceRegistry::load(&env, &RegistryOptions::default()).unwrap();
    assert_eq!(registry.resolve(None).unwrap().id, "default");

    // A multi-instance descriptor takes precedence over legacy variables.
    let env = env.with(
        "BOARDWIRE_INSTANCES",
        fixtures::descriptor_json(&["production", "staging"]),
    );
    let registry = InstanceRegistry::load(&env, &RegistryOptions::default()).unwrap();
    assert_eq!(registry.resolve(None).unwrap().id, "production");
    assert!(!registry.contains("default"));
}

#[tokio::test]
async fn test_read_only_instance_rejects_every_write_before_sending() {
    let mut config = fixtures::instance("archive");
    config.read_only = true;
    let registry = InstanceRegistry::from_instances(vec![config], "archive").unwrap();
    let connector = Arc::new(MockConnector::new().with_api("archive", fixtures::seeded_api()));
    let (factory, connector) = factory_with(registry, connector, tokens_for(&["archive"]));
    let client = factory.get_client(None).unwrap();
    let api = connector.api("archive");

    // Reads still work.
    let card = client.cards().get(LINKED_CARD_ID).await.unwrap();
    assert_eq!(card.card_id, LINKED_CARD_ID);
    api.clear_requests();

    let results = vec![
        client
            .workspaces()
            .create(&NewWorkspace { name: "x".to_string() })
            .await
            .map(drop),
        client
            .workspaces()
            .update(fixtures::WORKSPACE_ID, &WorkspaceUpdate::default())
            .await
            .map(drop),
        client
            .cards()
            .create(&NewCard {
                board_id: BOARD_ID,
                column_id: TODO_COLUMN_ID,
                lane_id: LANE_ID,
                title: "x".to_string(),
                description: None,
                position: None,
                linked_cards: Vec::new(),
            })
            .await
            .map(drop),
        client
            .cards()
            .update(LINKED_CARD_ID, CardUpdate::default())
            .await
            .map(drop),
        client.cards().delete(LINKED_CARD_ID).await,
    ];

    for result in &results {
        assert_read_only(result);
        assert!(matches!(
            result,
            Err(ClientError::ReadOnly { ref instance, .. }) if instance == "archive"
        ));
    }
    assert_eq!(api.write_count(), 0);
    assert_eq!(api.total_requests(), 0);
}
