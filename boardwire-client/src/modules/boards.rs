//! Boards of one instance, including their workflow structure.

use std::time::Duration;

use boardwire_core::{
    ApiRequest, Board, BoardFilter, BoardId, BoardStructure, BoardUpdate, ClientResult, Column,
    Lane, NewBoard, Workflow,
};
use futures_util::future::try_join3;

use super::{module_accessors, ModuleCore, Remote};
use crate::settings::ClientSettings;

pub const COLLECTION: &str = "boards";
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct Boards {
    core: ModuleCore,
}

module_accessors!(Boards);

impl Boards {
    pub(crate) fn new(remote: Remote, settings: &ClientSettings) -> Self {
        Self {
            core: ModuleCore::new(COLLECTION, remote, settings, DEFAULT_TTL),
        }
    }

    /// Boards matching `filter`. Archived boards are excluded unless asked for.
    pub async fn list(&self, filter: &BoardFilter) -> ClientResult<Vec<Board>> {
        let key = self.core.key(format!("list:{}", filter.cache_scope()));
        let mut request =
            ApiRequest::get("/boards").query_opt("workspace_ids", filter.workspace_id);
        if !filter.include_archived {
            request = request.query("is_archived", 0);
        }
        self.core.cached(&key, request).await
    }

    pub async fn get(&self, board_id: BoardId) -> ClientResult<Board> {
        let key = self.core.key(board_id);
        self.core
            .cached(&key, ApiRequest::get(format!("/boards/{board_id}")))
            .await
    }

    /// Workflows, columns and lanes of a board, cached as one entry
    /// (`boards:<id>:structure`).
    pub async fn structure(&self, board_id: BoardId) -> ClientResult<BoardStructure> {
        let key = self.core.key(format!("{board_id}:structure"));
        let remote = self.core.remote().clone();
        let value = self
            .core
            .cache()
            .get(&key, move || async move {
                let path = format!("/boards/{board_id}");
                let (workflows, columns, lanes) = try_join3(
                    remote.read::<Vec<Workflow>>(ApiRequest::get(format!("{path}/workflows"))),
                    remote.read::<Vec<Column>>(ApiRequest::get(format!("{path}/columns"))),
                    remote.read::<Vec<Lane>>(ApiRequest::get(format!("{path}/lanes"))),
                )
                .await?;
                Ok(serde_json::to_value(BoardStructure {
                    workflows,
                    columns,
                    lanes,
                })?)
            })
            .await?;
        super::decode(value)
    }

    pub async fn create(&self, board: &NewBoard) -> ClientResult<Board> {
        let body = serde_json::to_value(board)?;
        self.core
            .write("create board", ApiRequest::post("/boards", body))
            .await
    }

    pub async fn update(&self, board_id: BoardId, update: &BoardUpdate) -> ClientResult<Board> {
        let body = serde_json::to_value(update)?;
        self.core
            .write(
                "update board",
                ApiRequest::patch(format!("/boards/{board_id}"), body),
            )
            .await
    }
}
