//! Users of one instance. Read-only.

use std::time::Duration;

use boardwire_core::{ApiRequest, ClientResult, User, UserId};

use super::{module_accessors, ModuleCore, Remote};
use crate::settings::ClientSettings;

pub const COLLECTION: &str = "users";
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct Users {
    core: ModuleCore,
}

module_accessors!(Users);

impl Users {
    pub(crate) fn new(remote: Remote, settings: &ClientSettings) -> Self {
        Self {
            core: ModuleCore::new(COLLECTION, remote, settings, DEFAULT_TTL),
        }
    }

    pub async fn list(&self) -> ClientResult<Vec<User>> {
        let key = self.core.key("all");
        self.core.cached(&key, ApiRequest::get("/users")).await
    }

    pub async fn get(&self, user_id: UserId) -> ClientResult<User> {
        let key = self.core.key(user_id);
        self.core
            .cached(&key, ApiRequest::get(format!("/users/{user_id}")))
            .await
    }

    /// The user the instance's token authenticates as (`users:me`).
    pub async fn current(&self) -> ClientResult<User> {
        let key = self.core.key("me");
        self.core.cached(&key, ApiRequest::get("/me")).await
    }
}
