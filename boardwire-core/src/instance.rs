//! Backend instance description.

use serde::Serialize;

/// One independently configured backend account.
///
/// Built and validated by the instance registry, then shared behind an `Arc`
/// for the rest of the process. The API token itself is never stored here:
/// `token_env` names the environment variable that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub id: String,
    pub display_name: String,
    /// Absolute API base URL without a trailing slash.
    pub api_url: String,
    pub token_env: String,
    pub read_only: bool,
    pub default_workspace_id: Option<i64>,
    pub tags: Vec<String>,
}

impl InstanceConfig {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}
