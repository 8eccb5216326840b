//! boardwire CLI
//!
//! Loads the instance registry from the environment (or `--config <path>`),
//! installs the process-wide client factory and prints the configured
//! instances as JSON. `--check` adds a health check per instance.

use std::path::PathBuf;
use std::sync::Arc;

use boardwire_client::telemetry::init_tracing;
use boardwire_client::{
    global, ClientFactory, ClientResult, ClientSettings, InstanceRegistry, RegistryOptions,
    ToolContext,
};
use boardwire_core::{ClientError, ProcessEnv};

const USAGE: &str = "Usage: boardwire [--config <path>] [--check]";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    check: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> ClientResult<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--check" => parsed.check = true,
            "--config" => {
                let path = args.next().ok_or_else(|| {
                    ClientError::Internal(format!("--config needs a path. {USAGE}"))
                })?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => {
                return Err(ClientError::Internal(format!(
                    "Unknown argument '{other}'. {USAGE}"
                )))
            }
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> ClientResult<()> {
    init_tracing()?;
    let args = parse_args(std::env::args().skip(1))?;

    let mut options = RegistryOptions::default();
    if let Some(path) = args.config {
        options = options.with_config_path(path);
    }
    let registry = InstanceRegistry::load(&ProcessEnv, &options)?;

    let factory = ClientFactory::new(registry, ClientSettings::from_env(&ProcessEnv));
    let context = ToolContext::new(global::install(Arc::new(factory)));

    let summaries = context.list_instances(args.check).await;
    let output = serde_json::to_string_pretty(&summaries)?;
    println!("{output}");
    Ok(())
}
