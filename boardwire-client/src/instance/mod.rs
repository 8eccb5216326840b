//! Instance configuration: descriptor parsing, validation and resolution.

pub mod descriptor;
pub mod registry;

pub use descriptor::{DescriptorFormat, InstanceDescriptor, ValidatedInstances};
pub use registry::{ConfigSource, InstanceRegistry, RegistryOptions, LEGACY_INSTANCE_ID};
