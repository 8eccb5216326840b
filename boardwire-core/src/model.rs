//! Resource representations and write payloads.
//!
//! Field names follow the remote API (snake_case). Reads are lenient: any
//! field the remote omits falls back to its default. Write payloads skip
//! unset fields so they serialize as true partial updates.

use serde::{Deserialize, Serialize};

pub type WorkspaceId = i64;
pub type BoardId = i64;
pub type CardId = i64;
pub type UserId = i64;

// ============================================================================
// WORKSPACES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewWorkspace {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

// ============================================================================
// BOARDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub board_id: BoardId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewBoard {
    pub workspace_id: WorkspaceId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

/// Filter for listing boards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    pub workspace_id: Option<WorkspaceId>,
    pub include_archived: bool,
}

impl BoardFilter {
    /// Stable cache scope for this filter.
    pub fn cache_scope(&self) -> String {
        let workspace = self
            .workspace_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "all".to_string());
        if self.include_archived {
            format!("{workspace}:archived")
        } else {
            workspace
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub column_id: i64,
    pub workflow_id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_column_id: Option<i64>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub lane_id: i64,
    pub workflow_id: i64,
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

/// Workflows, columns and lanes of one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStructure {
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub lanes: Vec<Lane>,
}

// ============================================================================
// CARDS
// ============================================================================

/// Kind of relationship between two cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Parent,
    Child,
    Relative,
    Predecessor,
    Successor,
}

/// A relationship from one card to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardLink {
    pub card_id: CardId,
    pub link_type: LinkType,
}

impl CardLink {
    pub fn new(card_id: CardId, link_type: LinkType) -> Self {
        Self { card_id, link_type }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: CardId,
    pub board_id: BoardId,
    pub column_id: i64,
    pub lane_id: i64,
    #[serde(default)]
    pub position: i32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_user_id: Option<UserId>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub deadline: Option<String>,
    /// Relationship field. The remote replaces it wholesale on any partial
    /// update that omits it.
    #[serde(default)]
    pub linked_cards: Vec<CardLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewCard {
    pub board_id: BoardId,
    pub column_id: i64,
    pub lane_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub linked_cards: Vec<CardLink>,
}

/// Partial update of a card.
///
/// `linked_cards: None` means "keep whatever the card has"; `Some(vec![])`
/// explicitly clears every link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_cards: Option<Vec<CardLink>>,
}

/// Move of a card to another column and/or lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardMove {
    pub column_id: i64,
    pub lane_id: Option<i64>,
    pub position: Option<i32>,
}

impl CardMove {
    /// A move is a partial update of the positional fields only.
    pub fn into_update(self) -> CardUpdate {
        CardUpdate {
            column_id: Some(self.column_id),
            lane_id: self.lane_id,
            position: self.position,
            ..CardUpdate::default()
        }
    }
}

/// Filter for listing cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub board_id: Option<BoardId>,
    pub column_id: Option<i64>,
    pub lane_id: Option<i64>,
}

impl CardFilter {
    pub fn for_board(board_id: BoardId) -> Self {
        Self {
            board_id: Some(board_id),
            ..Self::default()
        }
    }

    /// Stable cache scope for this filter.
    pub fn cache_scope(&self) -> String {
        fn part(id: Option<i64>) -> String {
            id.map(|id| id.to_string()).unwrap_or_else(|| "*".to_string())
        }
        format!(
            "board={}&column={}&lane={}",
            part(self.board_id),
            part(self.column_id),
            part(self.lane_id)
        )
    }
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}
