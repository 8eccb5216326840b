//! Error types for boardwire operations

use thiserror::Error;

/// Instance configuration errors.
///
/// Raised while loading or validating the instance registry. Every variant
/// names the instance and field involved so the message is actionable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "No instance configuration found \
         (set BOARDWIRE_INSTANCES_FILE, BOARDWIRE_INSTANCES or BOARDWIRE_API_URL)"
    )]
    NoSource,

    #[error("Failed to read instance config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse instance config from {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("Invalid value for {field} on instance '{instance}': {reason}")]
    InvalidValue {
        instance: String,
        field: String,
        reason: String,
    },

    #[error("Unsupported instance config version '{version}'")]
    UnsupportedVersion { version: String },

    #[error("Instance config from {origin} declares no instances")]
    Empty { origin: String },

    #[error("Duplicate instance id '{id}'")]
    DuplicateInstance { id: String },

    #[error("More than one default instance declared: {ids:?}")]
    ConflictingDefaults { ids: Vec<String> },

    #[error("Default instance '{id}' is not declared")]
    UnknownDefault { id: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(
        instance: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            instance: instance.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Master error type for client operations.
///
/// Errors are `Clone` because a single upstream failure is delivered to
/// every caller that joined the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Instance '{id}' not found (configured: {})", .available.join(", "))]
    InstanceNotFound { id: String, available: Vec<String> },

    #[error(
        "API token for instance '{instance}' is missing: \
         environment variable {env_var} is not set"
    )]
    TokenMissing { instance: String, env_var: String },

    #[error("Instance '{instance}' is read-only; refusing {operation}")]
    ReadOnly { instance: String, operation: String },

    #[error("Upstream request failed{}: {message}", status_suffix(.status))]
    Upstream { status: Option<u16>, message: String },

    #[error("Failed to decode upstream response: {reason}")]
    Decode { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// HTTP status of an upstream failure, if the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::invalid("production", "apiUrl", "must be an absolute URL");
        let msg = format!("{}", err);
        assert!(msg.contains("apiUrl"));
        assert!(msg.contains("production"));
        assert!(msg.contains("must be an absolute URL"));
    }

    #[test]
    fn test_instance_not_found_lists_available() {
        let err = ClientError::InstanceNotFound {
            id: "staging".to_string(),
            available: vec!["production".to_string(), "sandbox".to_string()],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("'staging'"));
        assert!(msg.contains("production, sandbox"));
    }

    #[test]
    fn test_token_missing_names_variable() {
        let err = ClientError::TokenMissing {
            instance: "production".to_string(),
            env_var: "PROD_TOKEN".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("PROD_TOKEN"));
        assert!(msg.contains("production"));
    }

    #[test]
    fn test_upstream_display_with_and_without_status() {
        let with_status = ClientError::upstream(Some(503), "unavailable");
        assert_eq!(
            with_status.to_string(),
            "Upstream request failed with status 503: unavailable"
        );

        let without = ClientError::upstream(None, "connection reset");
        assert_eq!(
            without.to_string(),
            "Upstream request failed: connection reset"
        );
    }

    #[test]
    fn test_not_found_detection() {
        assert!(ClientError::upstream(Some(404), "gone").is_not_found());
        assert!(!ClientError::upstream(Some(500), "boom").is_not_found());
        assert!(!ClientError::Internal("x".to_string()).is_not_found());
    }

    #[test]
    fn test_client_error_from_config() {
        let err = ClientError::from(ConfigError::NoSource);
        assert!(matches!(err, ClientError::Config(ConfigError::NoSource)));
    }

    #[test]
    fn test_errors_are_clone() {
        let err = ClientError::upstream(Some(500), "boom");
        assert_eq!(err.clone(), err);
    }
}
