//! Instance registry: which backend accounts exist and which one a call targets.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use boardwire_core::{ClientError, ClientResult, ConfigError, EnvSource, InstanceConfig, ProcessEnv};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::descriptor::{validate_url, DescriptorFormat, InstanceDescriptor, ValidatedInstances};

/// Path of a descriptor file (JSON, or TOML by extension).
pub const INSTANCES_FILE_VAR: &str = "BOARDWIRE_INSTANCES_FILE";
/// Inline JSON descriptor.
pub const INSTANCES_VAR: &str = "BOARDWIRE_INSTANCES";

pub const LEGACY_URL_VAR: &str = "BOARDWIRE_API_URL";
pub const LEGACY_TOKEN_VAR: &str = "BOARDWIRE_API_TOKEN";
pub const LEGACY_READ_ONLY_VAR: &str = "BOARDWIRE_READ_ONLY_MODE";
pub const LEGACY_WORKSPACE_VAR: &str = "BOARDWIRE_DEFAULT_WORKSPACE_ID";
/// Id of the implicit instance built from the legacy variables.
pub const LEGACY_INSTANCE_ID: &str = "default";

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSource {
    File { path: PathBuf },
    Inline,
    Legacy,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "file {}", path.display()),
            Self::Inline => write!(f, "{INSTANCES_VAR}"),
            Self::Legacy => f.write_str("legacy environment variables"),
        }
    }
}

/// Options that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Descriptor path; wins over `BOARDWIRE_INSTANCES_FILE`.
    pub config_path: Option<PathBuf>,
}

impl RegistryOptions {
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}

/// Immutable view of the configured instances.
///
/// Built once per process. Nothing is reloaded implicitly; a new
/// configuration means a new registry (and a new client factory).
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    instances: Vec<Arc<InstanceConfig>>,
    default_id: String,
    session_default: Option<String>,
    source: ConfigSource,
}

impl InstanceRegistry {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&ProcessEnv, &RegistryOptions::default())
    }

    /// Load from the first source that is present and valid, in order:
    /// explicit descriptor file, inline descriptor, legacy variables.
    ///
    /// A source that is present but invalid is logged and skipped. When no
    /// source succeeds, the first source's error is returned; when none is
    /// present at all, [`ConfigError::NoSource`].
    pub fn load(env: &dyn EnvSource, options: &RegistryOptions) -> Result<Self, ConfigError> {
        let mut first_error: Option<ConfigError> = None;

        let file = options
            .config_path
            .clone()
            .or_else(|| env.non_empty(INSTANCES_FILE_VAR).map(PathBuf::from));
        if let Some(path) = file {
            match Self::from_file(path) {
                Ok(registry) => return Ok(registry.loaded()),
                Err(err) => {
                    warn!(error = %err, "Instance descriptor file rejected, trying next source");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(text) = env.non_empty(INSTANCES_VAR) {
            match Self::from_json(&text) {
                Ok(registry) => return Ok(registry.loaded()),
                Err(err) => {
                    warn!(error = %err, "Inline instance descriptor rejected, trying next source");
                    first_error.get_or_insert(err);
                }
            }
        }

        match Self::from_legacy_env(env) {
            Some(Ok(registry)) => return Ok(registry.loaded()),
            Some(Err(err)) => {
                warn!(error = %err, "Legacy instance variables rejected");
                first_error.get_or_insert(err);
            }
            None => {}
        }

        Err(first_error.unwrap_or(ConfigError::NoSource))
    }

    /// Load a descriptor file. `.toml` is parsed as TOML, anything else as JSON.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: origin.clone(),
            reason: e.to_string(),
        })?;
        let descriptor =
            InstanceDescriptor::parse(&text, DescriptorFormat::from_path(&path), &origin)?;
        let validated = descriptor.validate(&origin)?;
        Ok(Self::from_validated(validated, ConfigSource::File { path }))
    }

    /// Parse an inline JSON descriptor.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let descriptor = InstanceDescriptor::parse(text, DescriptorFormat::Json, INSTANCES_VAR)?;
        let validated = descriptor.validate(INSTANCES_VAR)?;
        Ok(Self::from_validated(validated, ConfigSource::Inline))
    }

    /// Build the implicit single instance from the legacy variables.
    ///
    /// Returns `None` when neither the URL nor the token variable is set. The
    /// token itself is not read here; the client factory reads it on first use.
    pub fn from_legacy_env(env: &dyn EnvSource) -> Option<Result<Self, ConfigError>> {
        let url = env.non_empty(LEGACY_URL_VAR);
        if url.is_none() && env.non_empty(LEGACY_TOKEN_VAR).is_none() {
            return None;
        }
        Some(legacy_instance(env, url).map(|instance| Self {
            default_id: instance.id.clone(),
            instances: vec![Arc::new(instance)],
            session_default: None,
            source: ConfigSource::Legacy,
        }))
    }

    /// Registry over already validated instances.
    ///
    /// # Errors
    ///
    /// Fails when `default_id` is not one of `instances` or ids repeat.
    pub fn from_instances(
        instances: Vec<InstanceConfig>,
        default_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let default_id = default_id.into();
        let mut seen = std::collections::HashSet::new();
        for instance in &instances {
            if !seen.insert(instance.id.as_str()) {
                return Err(ConfigError::DuplicateInstance {
                    id: instance.id.clone(),
                });
            }
        }
        if !seen.contains(default_id.as_str()) {
            return Err(ConfigError::UnknownDefault { id: default_id });
        }
        Ok(Self::from_validated(
            ValidatedInstances {
                instances,
                default_id,
            },
            ConfigSource::Inline,
        ))
    }

    fn from_validated(validated: ValidatedInstances, source: ConfigSource) -> Self {
        Self {
            instances: validated.instances.into_iter().map(Arc::new).collect(),
            default_id: validated.default_id,
            session_default: None,
            source,
        }
    }

    fn loaded(self) -> Self {
        info!(
            source = %self.source,
            instances = self.instances.len(),
            default = %self.default_id,
            "Instance registry loaded"
        );
        self
    }

    /// Set a session-level default, consulted between an explicit selector
    /// and the configured default.
    pub fn with_session_default(mut self, id: impl Into<String>) -> Self {
        self.session_default = Some(id.into());
        self
    }

    /// Pick the instance a call targets.
    ///
    /// Priority: explicit selector, session default, configured default (in
    /// legacy mode that is the single implicit instance). A blank selector
    /// counts as absent. An unknown id is an error and is never substituted.
    pub fn resolve(&self, selector: Option<&str>) -> ClientResult<Arc<InstanceConfig>> {
        let explicit = selector.map(str::trim).filter(|s| !s.is_empty());
        let id = explicit
            .or(self.session_default.as_deref())
            .unwrap_or(&self.default_id);

        let resolved = self.get(id).cloned().ok_or_else(|| ClientError::InstanceNotFound {
            id: id.to_string(),
            available: self.ids(),
        })?;
        debug!(selector = ?explicit, instance = %resolved.id, "Resolved instance");
        Ok(resolved)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<InstanceConfig>> {
        self.instances.iter().find(|instance| instance.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Instances in declaration order.
    pub fn instances(&self) -> &[Arc<InstanceConfig>] {
        &self.instances
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.id.clone()).collect()
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn session_default(&self) -> Option<&str> {
        self.session_default.as_deref()
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    pub fn is_legacy(&self) -> bool {
        self.source == ConfigSource::Legacy
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn legacy_instance(
    env: &dyn EnvSource,
    url: Option<String>,
) -> Result<InstanceConfig, ConfigError> {
    let url = url.ok_or_else(|| {
        ConfigError::invalid(LEGACY_INSTANCE_ID, LEGACY_URL_VAR, "is required when a token is set")
    })?;
    let api_url = validate_url(LEGACY_INSTANCE_ID, LEGACY_URL_VAR, &url)?;

    let read_only = match env.non_empty(LEGACY_READ_ONLY_VAR) {
        Some(raw) => parse_flag(&raw).ok_or_else(|| {
            ConfigError::invalid(
                LEGACY_INSTANCE_ID,
                LEGACY_READ_ONLY_VAR,
                format!("expected true/false, got '{raw}'"),
            )
        })?,
        None => false,
    };

    let default_workspace_id = match env.non_empty(LEGACY_WORKSPACE_VAR) {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ConfigError::invalid(
                LEGACY_INSTANCE_ID,
                LEGACY_WORKSPACE_VAR,
                format!("expected an integer id, got '{raw}'"),
            )
        })?),
        None => None,
    };

    Ok(InstanceConfig {
        id: LEGACY_INSTANCE_ID.to_string(),
        display_name: "Default".to_string(),
        api_url,
        token_env: LEGACY_TOKEN_VAR.to_string(),
        read_only,
        default_workspace_id,
        tags: Vec::new(),
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
