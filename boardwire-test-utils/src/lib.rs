//! boardwire Test Utilities
//!
//! Shared test infrastructure for the boardwire workspace:
//! - `MockBoardApi`, an in-memory remote API behind the `Transport` seam
//! - `MockConnector`, handing out one `MockBoardApi` per instance id
//! - Proptest generators for links, partial updates and instance ids
//! - Fixtures for common scenarios
//! - Assertions on the client error taxonomy

pub use boardwire_core::{
    ApiRequest, Board, BoardStructure, Card, CardLink, ClientError, ClientResult, Column,
    ConfigError, Connector, InstanceConfig, Lane, LinkType, Method, Transport, User, Workflow,
    Workspace,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK REMOTE API
// ============================================================================

#[derive(Debug)]
struct RemoteState {
    workspaces: BTreeMap<i64, Workspace>,
    boards: BTreeMap<i64, Board>,
    structures: HashMap<i64, BoardStructure>,
    cards: BTreeMap<i64, Card>,
    users: BTreeMap<i64, User>,
    current_user: Option<i64>,
    next_id: i64,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            workspaces: BTreeMap::new(),
            boards: BTreeMap::new(),
            structures: HashMap::new(),
            cards: BTreeMap::new(),
            users: BTreeMap::new(),
            current_user: None,
            next_id: 1_000,
        }
    }
}

impl RemoteState {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// In-memory stand-in for the remote project-management API.
///
/// Behaves like the real service where it matters to the client layer:
/// - every response body is wrapped in `{"data": ...}`
/// - `PATCH /cards/{id}` replaces `linked_cards` wholesale, so omitting the
///   field clears every link
/// - unknown ids answer with a 404 upstream error
///
/// Every request is recorded before it is served. Tests can inject failures
/// per `(method, path)` and hold requests in flight with [`MockBoardApi::hold`].
#[derive(Debug, Default)]
pub struct MockBoardApi {
    state: Mutex<RemoteState>,
    log: Mutex<Vec<ApiRequest>>,
    failures: Mutex<HashMap<(Method, String), ClientError>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockBoardApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(self, workspace: Workspace) -> Self {
        lock(&self.state)
            .workspaces
            .insert(workspace.workspace_id, workspace);
        self
    }

    pub fn with_board(self, board: Board) -> Self {
        lock(&self.state).boards.insert(board.board_id, board);
        self
    }

    pub fn with_structure(self, board_id: i64, structure: BoardStructure) -> Self {
        lock(&self.state).structures.insert(board_id, structure);
        self
    }

    pub fn with_card(self, card: Card) -> Self {
        self.insert_card(card);
        self
    }

    pub fn with_user(self, user: User) -> Self {
        lock(&self.state).users.insert(user.user_id, user);
        self
    }

    /// Register `user` and make it the authenticated user behind `GET /me`.
    pub fn with_current_user(self, user: User) -> Self {
        {
            let mut state = lock(&self.state);
            state.current_user = Some(user.user_id);
            state.users.insert(user.user_id, user);
        }
        self
    }

    /// Write a card straight into remote state, bypassing the request log.
    pub fn insert_card(&self, card: Card) {
        lock(&self.state).cards.insert(card.card_id, card);
    }

    /// Read a card straight from remote state, bypassing the request log.
    pub fn card(&self, card_id: i64) -> Option<Card> {
        lock(&self.state).cards.get(&card_id).cloned()
    }

    pub fn workspace(&self, workspace_id: i64) -> Option<Workspace> {
        lock(&self.state).workspaces.get(&workspace_id).cloned()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.log).clone()
    }

    pub fn total_requests(&self) -> usize {
        lock(&self.log).len()
    }

    /// Number of requests received for `method` on exactly `path`.
    pub fn request_count(&self, method: Method, path: &str) -> usize {
        lock(&self.log)
            .iter()
            .filter(|req| req.method == method && req.path == path)
            .count()
    }

    /// Number of requests that change remote state.
    pub fn write_count(&self) -> usize {
        lock(&self.log)
            .iter()
            .filter(|req| req.method.is_write())
            .count()
    }

    pub fn clear_requests(&self) {
        lock(&self.log).clear();
    }

    /// Answer every request for `method` on `path` with `error` until
    /// [`MockBoardApi::clear_failures`].
    pub fn fail(&self, method: Method, path: impl Into<String>, error: ClientError) {
        lock(&self.failures).insert((method, path.into()), error);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Keep every subsequent request in flight until [`MockBoardApi::release`].
    ///
    /// Held requests are already recorded, so a test can wait for one with
    /// [`MockBoardApi::wait_for_request`] and act while it is outstanding.
    pub fn hold(&self) {
        *lock(&self.gate) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let every held request (and every later one) through.
    pub fn release(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.close();
        }
    }

    /// Yield until at least `count` requests for `method` on `path` arrived.
    pub async fn wait_for_requests(&self, method: Method, path: &str, count: usize) {
        while self.request_count(method, path) < count {
            tokio::task::yield_now().await;
        }
    }

    pub async fn wait_for_request(&self, method: Method, path: &str) {
        self.wait_for_requests(method, path, 1).await;
    }

    fn serve(&self, request: &ApiRequest) -> ClientResult<Value> {
        let mut state = lock(&self.state);
        let path = request.path.trim_matches('/').to_string();
        let segments: Vec<&str> = path.split('/').collect();

        let data = match (request.method, segments.as_slice()) {
            (Method::Get, ["workspaces"]) => {
                to_json(state.workspaces.values().collect::<Vec<_>>())?
            }
            (Method::Get, ["workspaces", id]) => {
                let id = parse_id(request, id)?;
                to_json(found(request, state.workspaces.get(&id))?)?
            }
            (Method::Post, ["workspaces"]) => {
                let id = state.allocate_id();
                let workspace: Workspace = with_id(request, "workspace_id", id)?;
                state.workspaces.insert(id, workspace.clone());
                to_json(workspace)?
            }
            (Method::Patch, ["workspaces", id]) => {
                let id = parse_id(request, id)?;
                let current = found(request, state.workspaces.get(&id))?;
                let updated = overlay(current, body_fields(request))?;
                state.workspaces.insert(id, updated.clone());
                to_json(updated)?
            }

            (Method::Get, ["boards"]) => {
                let workspaces = query_ids(request, "workspace_ids");
                let active_only = query_value(request, "is_archived") == Some("0");
                let boards: Vec<&Board> = state
                    .boards
                    .values()
                    .filter(|b| workspaces.is_empty() || workspaces.contains(&b.workspace_id))
                    .filter(|b| !(active_only && b.is_archived))
                    .collect();
                to_json(boards)?
            }
            (Method::Get, ["boards", id]) => {
                let id = parse_id(request, id)?;
                to_json(found(request, state.boards.get(&id))?)?
            }
            (Method::Get, ["boards", id, part]) => {
                let id = parse_id(request, id)?;
                found(request, state.boards.get(&id))?;
                let structure = state.structures.get(&id).cloned().unwrap_or_default();
                match *part {
                    "workflows" => to_json(structure.workflows)?,
                    "columns" => to_json(structure.columns)?,
                    "lanes" => to_json(structure.lanes)?,
                    _ => return Err(no_route(request)),
                }
            }
            (Method::Post, ["boards"]) => {
                let id = state.allocate_id();
                let board: Board = with_id(request, "board_id", id)?;
                state.boards.insert(id, board.clone());
                to_json(board)?
            }
            (Method::Patch, ["boards", id]) => {
                let id = parse_id(request, id)?;
                let current = found(request, state.boards.get(&id))?;
                let updated = overlay(current, body_fields(request))?;
                state.boards.insert(id, updated.clone());
                to_json(updated)?
            }

            (Method::Get, ["cards"]) => {
                let boards = query_ids(request, "board_ids");
                let columns = query_ids(request, "column_ids");
                let lanes = query_ids(request, "lane_ids");
                let cards: Vec<&Card> = state
                    .cards
                    .values()
                    .filter(|c| boards.is_empty() || boards.contains(&c.board_id))
                    .filter(|c| columns.is_empty() || columns.contains(&c.column_id))
                    .filter(|c| lanes.is_empty() || lanes.contains(&c.lane_id))
                    .collect();
                to_json(cards)?
            }
            (Method::Get, ["cards", id]) => {
                let id = parse_id(request, id)?;
                to_json(found(request, state.cards.get(&id))?)?
            }
            (Method::Post, ["cards"]) => {
                let id = state.allocate_id();
                let card: Card = with_id(request, "card_id", id)?;
                state.cards.insert(id, card.clone());
                to_json(card)?
            }
            (Method::Patch, ["cards", id]) => {
                let id = parse_id(request, id)?;
                let current = found(request, state.cards.get(&id))?;
                let mut fields = body_fields(request);
                // Partial updates replace the relationship field wholesale.
                fields
                    .entry("linked_cards".to_string())
                    .or_insert_with(|| json!([]));
                let updated = overlay(current, fields)?;
                state.cards.insert(id, updated.clone());
                to_json(updated)?
            }
            (Method::Delete, ["cards", id]) => {
                let id = parse_id(request, id)?;
                found(request, state.cards.get(&id))?;
                state.cards.remove(&id);
                return Ok(Value::Null);
            }

            (Method::Get, ["users"]) => to_json(state.users.values().collect::<Vec<_>>())?,
            (Method::Get, ["users", id]) => {
                let id = parse_id(request, id)?;
                to_json(found(request, state.users.get(&id))?)?
            }
            (Method::Get, ["me"]) => {
                let user = state.current_user.and_then(|id| state.users.get(&id));
                match user {
                    Some(user) => to_json(user)?,
                    None => return Err(ClientError::upstream(Some(401), "not authenticated")),
                }
            }

            _ => return Err(no_route(request)),
        };

        Ok(json!({ "data": data }))
    }
}

#[async_trait]
impl Transport for MockBoardApi {
    async fn execute(&self, request: ApiRequest) -> ClientResult<Value> {
        lock(&self.log).push(request.clone());

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            // Closed on release; the error just means "go ahead".
            let _ = gate.acquire().await;
        }

        let injected = lock(&self.failures)
            .get(&(request.method, request.path.clone()))
            .cloned();
        if let Some(error) = injected {
            return Err(error);
        }

        self.serve(&request)
    }
}

fn to_json<T: Serialize>(value: T) -> ClientResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn no_route(request: &ApiRequest) -> ClientError {
    ClientError::upstream(
        Some(404),
        format!("no route for {} {}", request.method, request.path),
    )
}

fn found<'a, T>(request: &ApiRequest, value: Option<&'a T>) -> ClientResult<&'a T> {
    value.ok_or_else(|| ClientError::upstream(Some(404), format!("{} not found", request.path)))
}

fn parse_id(request: &ApiRequest, raw: &str) -> ClientResult<i64> {
    raw.parse().map_err(|_| no_route(request))
}

fn body_fields(request: &ApiRequest) -> Map<String, Value> {
    request
        .body
        .as_ref()
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn with_id<T: DeserializeOwned>(request: &ApiRequest, field: &str, id: i64) -> ClientResult<T> {
    let mut fields = body_fields(request);
    fields.insert(field.to_string(), json!(id));
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ClientError::upstream(Some(400), format!("invalid body: {e}")))
}

fn overlay<T: Serialize + DeserializeOwned>(
    current: &T,
    fields: Map<String, Value>,
) -> ClientResult<T> {
    let mut value = serde_json::to_value(current)?;
    if let Some(target) = value.as_object_mut() {
        target.extend(fields);
    }
    serde_json::from_value(value)
        .map_err(|e| ClientError::upstream(Some(400), format!("invalid body: {e}")))
}

fn query_value<'a>(request: &'a ApiRequest, name: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn query_ids(request: &ApiRequest, name: &str) -> Vec<i64> {
    query_value(request, name)
        .map(|raw| raw.split(',').filter_map(|id| id.trim().parse().ok()).collect())
        .unwrap_or_default()
}

// ============================================================================
// MOCK CONNECTOR
// ============================================================================

/// Connector that serves every instance from its own [`MockBoardApi`].
///
/// APIs are created on first use and kept, so a test can seed or inspect the
/// remote state of any instance id before or after the client connects.
#[derive(Debug, Default)]
pub struct MockConnector {
    apis: Mutex<HashMap<String, Arc<MockBoardApi>>>,
    connects: Mutex<HashMap<String, usize>>,
    tokens: Mutex<HashMap<String, String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `instance` from `api`.
    pub fn with_api(self, instance: impl Into<String>, api: MockBoardApi) -> Self {
        lock(&self.apis).insert(instance.into(), Arc::new(api));
        self
    }

    /// The remote API behind `instance`, created empty if needed.
    pub fn api(&self, instance: &str) -> Arc<MockBoardApi> {
        Arc::clone(
            lock(&self.apis)
                .entry(instance.to_string())
                .or_insert_with(|| Arc::new(MockBoardApi::new())),
        )
    }

    /// How many transports were built for `instance`.
    pub fn connect_count(&self, instance: &str) -> usize {
        lock(&self.connects).get(instance).copied().unwrap_or(0)
    }

    pub fn total_connects(&self) -> usize {
        lock(&self.connects).values().sum()
    }

    /// The token the last transport for `instance` was built with.
    pub fn token_for(&self, instance: &str) -> Option<String> {
        lock(&self.tokens).get(instance).cloned()
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        instance: &InstanceConfig,
        token: SecretString,
    ) -> ClientResult<Arc<dyn Transport>> {
        *lock(&self.connects).entry(instance.id.clone()).or_insert(0) += 1;
        lock(&self.tokens).insert(instance.id.clone(), token.expose_secret().to_string());
        let api: Arc<dyn Transport> = self.api(&instance.id);
        Ok(api)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for boardwire types.

    use super::*;
    use boardwire_core::CardUpdate;
    use proptest::prelude::*;

    pub fn arb_link_type() -> impl Strategy<Value = LinkType> {
        prop_oneof![
            Just(LinkType::Parent),
            Just(LinkType::Child),
            Just(LinkType::Relative),
            Just(LinkType::Predecessor),
            Just(LinkType::Successor),
        ]
    }

    pub fn arb_card_link() -> impl Strategy<Value = CardLink> {
        (1i64..10_000, arb_link_type())
            .prop_map(|(card_id, link_type)| CardLink::new(card_id, link_type))
    }

    /// Up to `max` links, possibly none.
    pub fn arb_links(max: usize) -> impl Strategy<Value = Vec<CardLink>> {
        prop::collection::vec(arb_card_link(), 0..=max)
    }

    pub fn arb_non_empty_links() -> impl Strategy<Value = Vec<CardLink>> {
        prop::collection::vec(arb_card_link(), 1..=5)
    }

    /// A partial card update that never mentions the relationship field.
    pub fn arb_update_without_links() -> impl Strategy<Value = CardUpdate> {
        (
            proptest::option::of("[A-Za-z ]{1,24}"),
            proptest::option::of("[A-Za-z .]{0,48}"),
            proptest::option::of(0i32..5),
            proptest::option::of(1i64..100),
        )
            .prop_map(|(title, description, priority, owner_user_id)| CardUpdate {
                title,
                description,
                priority,
                owner_user_id,
                ..CardUpdate::default()
            })
    }

    /// Instance ids accepted by the registry.
    pub fn arb_instance_id() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,15}"
    }

    /// Distinct instance ids in declaration order.
    pub fn arb_instance_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_instance_id(), 1..=max.max(1))
            .prop_map(|ids| ids.into_iter().collect())
    }

    /// Environment variable names accepted as token references.
    pub fn arb_env_var_name() -> impl Strategy<Value = String> {
        "[A-Z][A-Z0-9_]{0,20}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made remote state and instance configurations.

    use super::*;

    pub const WORKSPACE_ID: i64 = 1;
    pub const BOARD_ID: i64 = 10;
    pub const TODO_COLUMN_ID: i64 = 11;
    pub const DONE_COLUMN_ID: i64 = 12;
    pub const LANE_ID: i64 = 21;
    /// Card seeded with two links (a child and a relative).
    pub const LINKED_CARD_ID: i64 = 100;
    pub const CHILD_CARD_ID: i64 = 101;
    pub const RELATIVE_CARD_ID: i64 = 102;
    pub const CURRENT_USER_ID: i64 = 7;

    pub fn workspace(id: i64, name: &str) -> Workspace {
        Workspace {
            workspace_id: id,
            name: name.to_string(),
            is_archived: false,
        }
    }

    pub fn board(id: i64, workspace_id: i64, name: &str) -> Board {
        Board {
            board_id: id,
            workspace_id,
            name: name.to_string(),
            description: None,
            is_archived: false,
        }
    }

    pub fn structure() -> BoardStructure {
        BoardStructure {
            workflows: vec![Workflow {
                workflow_id: 1,
                name: "Delivery".to_string(),
            }],
            columns: vec![
                Column {
                    column_id: TODO_COLUMN_ID,
                    workflow_id: 1,
                    name: "To Do".to_string(),
                    parent_column_id: None,
                    position: 0,
                },
                Column {
                    column_id: DONE_COLUMN_ID,
                    workflow_id: 1,
                    name: "Done".to_string(),
                    parent_column_id: None,
                    position: 1,
                },
            ],
            lanes: vec![Lane {
                lane_id: LANE_ID,
                workflow_id: 1,
                name: "Default".to_string(),
                position: 0,
            }],
        }
    }

    pub fn card(id: i64, title: &str) -> Card {
        Card {
            card_id: id,
            board_id: BOARD_ID,
            column_id: TODO_COLUMN_ID,
            lane_id: LANE_ID,
            position: 0,
            title: title.to_string(),
            description: None,
            owner_user_id: None,
            priority: None,
            deadline: None,
            linked_cards: Vec::new(),
        }
    }

    pub fn linked_card(id: i64, title: &str, links: Vec<CardLink>) -> Card {
        Card {
            linked_cards: links,
            ..card(id, title)
        }
    }

    pub fn user(id: i64, username: &str) -> User {
        User {
            user_id: id,
            email: Some(format!("{username}@example.com")),
            username: Some(username.to_string()),
            realname: None,
            is_enabled: true,
        }
    }

    /// The two links seeded on [`LINKED_CARD_ID`].
    pub fn seeded_links() -> Vec<CardLink> {
        vec![
            CardLink::new(CHILD_CARD_ID, LinkType::Child),
            CardLink::new(RELATIVE_CARD_ID, LinkType::Relative),
        ]
    }

    /// One workspace, one board with structure, three cards and a current user.
    pub fn seeded_api() -> MockBoardApi {
        MockBoardApi::new()
            .with_workspace(workspace(WORKSPACE_ID, "Engineering"))
            .with_board(board(BOARD_ID, WORKSPACE_ID, "Platform"))
            .with_structure(BOARD_ID, structure())
            .with_card(linked_card(LINKED_CARD_ID, "Ship release", seeded_links()))
            .with_card(card(CHILD_CARD_ID, "Write changelog"))
            .with_card(card(RELATIVE_CARD_ID, "Update docs"))
            .with_current_user(user(CURRENT_USER_ID, "ada"))
    }

    /// Token variable name conventionally used for `id` in tests.
    pub fn token_env(id: &str) -> String {
        format!("{}_TOKEN", id.to_ascii_uppercase().replace('-', "_"))
    }

    pub fn instance(id: &str) -> InstanceConfig {
        InstanceConfig {
            id: id.to_string(),
            display_name: id.to_string(),
            api_url: format!("https://{id}.example.com/api/v2"),
            token_env: token_env(id),
            read_only: false,
            default_workspace_id: None,
            tags: Vec::new(),
        }
    }

    /// JSON descriptor declaring `ids` in order, the first one default.
    pub fn descriptor_json(ids: &[&str]) -> String {
        let instances: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "name": id,
                    "apiUrl": format!("https://{id}.example.com/api/v2"),
                    "apiTokenEnv": token_env(id),
                })
            })
            .collect();
        json!({
            "version": "1",
            "defaultInstance": ids.first(),
            "instances": instances,
        })
        .to_string()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the client error taxonomy.

    use super::*;

    #[track_caller]
    pub fn assert_instance_not_found<T: std::fmt::Debug>(result: &ClientResult<T>, expected: &str) {
        match result {
            Err(ClientError::InstanceNotFound { id, .. }) => {
                assert_eq!(id, expected, "Wrong instance id in InstanceNotFound");
            }
            other => panic!("Expected InstanceNotFound({expected}), got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_token_missing<T: std::fmt::Debug>(result: &ClientResult<T>, expected_var: &str) {
        match result {
            Err(ClientError::TokenMissing { env_var, .. }) => {
                assert_eq!(env_var, expected_var, "Wrong variable in TokenMissing");
            }
            other => panic!("Expected TokenMissing({expected_var}), got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_read_only<T: std::fmt::Debug>(result: &ClientResult<T>) {
        match result {
            Err(ClientError::ReadOnly { .. }) => {}
            other => panic!("Expected ReadOnly error, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_upstream_status<T: std::fmt::Debug>(result: &ClientResult<T>, expected: u16) {
        match result {
            Err(err @ ClientError::Upstream { .. }) => {
                assert_eq!(err.status(), Some(expected), "Wrong upstream status");
            }
            other => panic!("Expected Upstream({expected}) error, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &ClientResult<T>) {
        match result {
            Err(ClientError::Config(_)) => {}
            other => panic!("Expected Config error, got: {other:?}"),
        }
    }
}
