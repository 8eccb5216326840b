//! Tracing subscriber setup for the `boardwire` binary.
//!
//! Library code only emits events; installing a subscriber is left to the
//! process that embeds it.

use boardwire_core::{ClientError, ClientResult, EnvSource, ProcessEnv};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects the output format (`text` or `json`).
pub const LOG_FORMAT_VAR: &str = "BOARDWIRE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "boardwire=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to text.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    pub fn from_env(env: &dyn EnvSource) -> Self {
        env.non_empty(LOG_FORMAT_VAR)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default
/// `boardwire=info`), events on stderr.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> ClientResult<()> {
    let format = LogFormat::from_env(&ProcessEnv);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| ClientError::Internal(format!("Failed to init subscriber: {e}")))?;

    tracing::debug!(format = ?format, "Tracing initialized");
    Ok(())
}
