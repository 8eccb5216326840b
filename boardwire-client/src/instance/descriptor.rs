//! Multi-instance descriptor: the on-disk / in-env shape and its validation.
//!
//! Nothing here is coerced. Every rule failure is a [`ConfigError`] naming
//! the instance and the field.

use std::collections::HashSet;
use std::path::Path;

use boardwire_core::{ConfigError, InstanceConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static INSTANCE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("Invalid instance id regex")
});

static ENV_VAR_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid env var regex"));

/// Serialization format of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Json,
    Toml,
}

impl DescriptorFormat {
    /// `.toml` files are TOML, everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum DescriptorVersion {
    Text(String),
    Number(u64),
}

/// Descriptor as written by the operator.
///
/// Unknown keys are rejected, which also keeps a literal `apiToken` from ever
/// being accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstanceDescriptor {
    #[serde(default)]
    version: Option<DescriptorVersion>,
    #[serde(default)]
    default_instance: Option<String>,
    instances: Vec<InstanceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct InstanceEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    api_url: String,
    api_token_env: String,
    #[serde(default)]
    read_only_mode: bool,
    #[serde(default)]
    default_workspace_id: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    default: bool,
}

/// Validated instances in declaration order plus the default id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInstances {
    pub instances: Vec<InstanceConfig>,
    pub default_id: String,
}

impl InstanceDescriptor {
    pub fn parse(text: &str, format: DescriptorFormat, origin: &str) -> Result<Self, ConfigError> {
        let parsed = match format {
            DescriptorFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            DescriptorFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| ConfigError::Parse {
            origin: origin.to_string(),
            reason,
        })
    }

    pub fn validate(self, origin: &str) -> Result<ValidatedInstances, ConfigError> {
        if let Some(version) = &self.version {
            check_version(version)?;
        }
        if self.instances.is_empty() {
            return Err(ConfigError::Empty {
                origin: origin.to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut marked = Vec::new();
        let mut instances = Vec::with_capacity(self.instances.len());
        for entry in self.instances {
            let config = entry.validate()?;
            if !seen.insert(config.id.clone()) {
                return Err(ConfigError::DuplicateInstance { id: config.id });
            }
            if entry.default {
                marked.push(config.id.clone());
            }
            instances.push(config);
        }

        let declared = self.default_instance;
        let default_id = resolve_default(declared, marked, &instances)?;

        Ok(ValidatedInstances {
            instances,
            default_id,
        })
    }
}

impl InstanceEntry {
    fn validate(&self) -> Result<InstanceConfig, ConfigError> {
        let id = self.name.as_str();
        if !INSTANCE_ID.is_match(id) {
            return Err(ConfigError::invalid(
                id,
                "name",
                "must start with a letter or digit and contain only letters, digits, \
                 '_' or '-' (max 64)",
            ));
        }

        let api_url = validate_url(id, "apiUrl", &self.api_url)?;

        if !ENV_VAR_NAME.is_match(&self.api_token_env) {
            return Err(ConfigError::invalid(
                id,
                "apiTokenEnv",
                "must be an environment variable name, not a token value",
            ));
        }

        let display_name = match self.display_name.as_deref() {
            Some(name) => {
                check_text(id, "displayName", name)?;
                name.to_string()
            }
            None => id.to_string(),
        };

        for tag in &self.tags {
            check_text(id, "tags", tag)?;
        }

        Ok(InstanceConfig {
            id: id.to_string(),
            display_name,
            api_url,
            token_env: self.api_token_env.clone(),
            read_only: self.read_only_mode,
            default_workspace_id: self.default_workspace_id,
            tags: self.tags.clone(),
        })
    }
}

/// Free text must be non-blank and carry no surrounding whitespace.
fn check_text(instance: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(instance, field, "must not be blank"));
    }
    if value.trim() != value {
        return Err(ConfigError::invalid(
            instance,
            field,
            format!("must not have surrounding whitespace, got '{value}'"),
        ));
    }
    Ok(())
}

fn check_version(version: &DescriptorVersion) -> Result<(), ConfigError> {
    let supported = match version {
        DescriptorVersion::Number(n) => *n == 1,
        DescriptorVersion::Text(text) => {
            let text = text.trim();
            text == "1" || text.starts_with("1.")
        }
    };
    if supported {
        Ok(())
    } else {
        let version = match version {
            DescriptorVersion::Number(n) => n.to_string(),
            DescriptorVersion::Text(text) => text.clone(),
        };
        Err(ConfigError::UnsupportedVersion { version })
    }
}

fn resolve_default(
    declared: Option<String>,
    marked: Vec<String>,
    instances: &[InstanceConfig],
) -> Result<String, ConfigError> {
    if marked.len() > 1 {
        return Err(ConfigError::ConflictingDefaults { ids: marked });
    }
    match (declared, marked.into_iter().next()) {
        (Some(declared), Some(marked)) if declared != marked => {
            Err(ConfigError::ConflictingDefaults {
                ids: vec![declared, marked],
            })
        }
        (Some(declared), _) => {
            if instances.iter().any(|i| i.id == declared) {
                Ok(declared)
            } else {
                Err(ConfigError::UnknownDefault { id: declared })
            }
        }
        (None, Some(marked)) => Ok(marked),
        (None, None) => instances
            .first()
            .map(|first| first.id.clone())
            .ok_or_else(|| ConfigError::Empty {
                origin: "descriptor".to_string(),
            }),
    }
}

/// Validate an absolute http(s) URL and strip any trailing slash.
pub(crate) fn validate_url(instance: &str, field: &str, raw: &str) -> Result<String, ConfigError> {
    if raw.trim() != raw {
        return Err(ConfigError::invalid(
            instance,
            field,
            "must not have surrounding whitespace",
        ));
    }
    let url = reqwest::Url::parse(raw)
        .map_err(|e| ConfigError::invalid(instance, field, format!("not an absolute URL ({e})")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            instance,
            field,
            format!("scheme must be http or https, got '{}'", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::invalid(instance, field, "must include a host"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use boardwire_test_utils::generators::{arb_env_var_name, arb_instance_ids};
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Well-formed descriptors always validate, keep declaration order and
        /// pick the first instance as default.
        #[test]
        fn prop_valid_descriptor_round_trips(
            ids in arb_instance_ids(5),
            token_env in arb_env_var_name(),
        ) {
            let entries: Vec<_> = ids
                .iter()
                .map(|id| json!({
                    "name": id,
                    "apiUrl": format!("https://boards.example.com/{id}/api"),
                    "apiTokenEnv": token_env,
                }))
                .collect();
            let text = json!({ "instances": entries }).to_string();
            let validated = InstanceDescriptor::parse(&text, DescriptorFormat::Json, "prop")
                .unwrap()
                .validate("prop")
                .unwrap();

            let got: Vec<_> = validated.instances.iter().map(|i| i.id.clone()).collect();
            prop_assert_eq!(&got, &ids);
            prop_assert_eq!(&validated.default_id, &ids[0]);
        }

        /// Anything that is not an identifier is rejected as a token reference.
        #[test]
        fn prop_token_values_rejected(token in "[a-z]{2,8}-[A-Za-z0-9]{4,16}") {
            let text = json!({
                "instances": [{
                    "name": "prod",
                    "apiUrl": "https://acme.example.com",
                    "apiTokenEnv": token,
                }]
            })
            .to_string();
            let result = InstanceDescriptor::parse(&text, DescriptorFormat::Json, "prop")
                .unwrap()
                .validate("prop");
            let rejected = matches!(
                result,
                Err(ConfigError::InvalidValue { ref field, .. }) if field == "apiTokenEnv"
            );
            prop_assert!(rejected);
        }
    }
}
