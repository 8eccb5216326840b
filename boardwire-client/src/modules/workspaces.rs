//! Workspaces of one instance.

use std::time::Duration;

use boardwire_core::{
    ApiRequest, ClientResult, NewWorkspace, Workspace, WorkspaceId, WorkspaceUpdate,
};

use super::{module_accessors, ModuleCore, Remote};
use crate::settings::ClientSettings;

pub const COLLECTION: &str = "workspaces";
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct Workspaces {
    core: ModuleCore,
}

module_accessors!(Workspaces);

impl Workspaces {
    pub(crate) fn new(remote: Remote, settings: &ClientSettings) -> Self {
        Self {
            core: ModuleCore::new(COLLECTION, remote, settings, DEFAULT_TTL),
        }
    }

    /// Every workspace visible to the instance's token (`workspaces:all`).
    pub async fn list(&self) -> ClientResult<Vec<Workspace>> {
        let key = self.core.key("all");
        self.core.cached(&key, ApiRequest::get("/workspaces")).await
    }

    pub async fn get(&self, workspace_id: WorkspaceId) -> ClientResult<Workspace> {
        let key = self.core.key(workspace_id);
        self.core
            .cached(&key, ApiRequest::get(format!("/workspaces/{workspace_id}")))
            .await
    }

    /// The instance's configured default workspace, if any.
    pub async fn default_workspace(&self) -> ClientResult<Option<Workspace>> {
        match self.core.remote().instance().default_workspace_id {
            Some(id) => self.get(id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn create(&self, workspace: &NewWorkspace) -> ClientResult<Workspace> {
        let body = serde_json::to_value(workspace)?;
        self.core
            .write("create workspace", ApiRequest::post("/workspaces", body))
            .await
    }

    pub async fn update(
        &self,
        workspace_id: WorkspaceId,
        update: &WorkspaceUpdate,
    ) -> ClientResult<Workspace> {
        let body = serde_json::to_value(update)?;
        self.core
            .write(
                "update workspace",
                ApiRequest::patch(format!("/workspaces/{workspace_id}"), body),
            )
            .await
    }
}
