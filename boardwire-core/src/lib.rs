//! boardwire core types
//!
//! Shared by every boardwire crate:
//! - the error taxonomy ([`ConfigError`], [`ClientError`])
//! - the immutable [`InstanceConfig`] of one backend account
//! - the [`Transport`] and [`Connector`] seams that keep HTTP out of the
//!   resource modules
//! - the [`EnvSource`] abstraction used for configuration and tokens
//! - resource models and write payloads

pub mod env;
pub mod error;
pub mod instance;
pub mod model;
pub mod transport;

pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{ClientError, ClientResult, ConfigError};
pub use instance::InstanceConfig;
pub use model::*;
pub use transport::{ApiRequest, Connector, Method, Transport};
