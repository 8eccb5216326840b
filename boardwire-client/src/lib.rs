//! boardwire client layer
//!
//! Multi-instance access to a project-management API:
//! - [`InstanceRegistry`] loads instance descriptions from a descriptor file,
//!   an inline descriptor or the legacy single-instance variables, and
//!   resolves instance selectors
//! - [`ClientFactory`] lazily builds one isolated [`ResolvedClient`] per
//!   resolved instance
//! - the resource [`modules`] read through per-instance response caches and
//!   invalidate their collection after writes
//! - [`MergeUpdateCoordinator`] keeps card links intact across partial updates
//! - [`discovery`] and [`ToolContext`] expose the layer to tool handlers
//!
//! ```no_run
//! # async fn run() -> boardwire_client::ClientResult<()> {
//! use boardwire_client::{ClientFactory, CardFilter};
//!
//! let factory = ClientFactory::from_env()?;
//! let client = factory.get_client(Some("production"))?;
//! let cards = client.cards().list(&CardFilter::for_board(10)).await?;
//! # let _ = cards;
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod factory;
pub mod global;
pub mod instance;
pub mod merge;
pub mod modules;
pub mod rest;
pub mod settings;
pub mod telemetry;
pub mod tools;

pub use boardwire_cache::{CacheConfig, CacheStats, KeyPattern, ResponseCache};
pub use boardwire_core::*;
pub use discovery::{
    instance_detail, list_instances, InstanceDetail, InstanceHealth, InstanceSummary,
};
pub use factory::{ClientFactory, ResolvedClient};
pub use instance::{ConfigSource, InstanceRegistry, RegistryOptions};
pub use merge::{MergeDecision, MergeUpdateCoordinator, RelationshipPayload};
pub use modules::{Boards, Cards, UpdateOutcome, Users, Workspaces};
pub use rest::{HttpConnector, RestClient};
pub use settings::ClientSettings;
pub use tools::ToolContext;
