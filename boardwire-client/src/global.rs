//! Process-wide factory accessor.
//!
//! Only the outermost composition point (the binary, a tool server's
//! startup) installs a factory here. Library code takes an explicit
//! [`ClientFactory`] or [`ToolContext`](crate::tools::ToolContext).

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;
use tracing::warn;

use crate::factory::ClientFactory;

static FACTORY: Lazy<RwLock<Option<Arc<ClientFactory>>>> = Lazy::new(|| RwLock::new(None));

fn slot_read() -> RwLockReadGuard<'static, Option<Arc<ClientFactory>>> {
    match FACTORY.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Global factory lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn slot_write() -> RwLockWriteGuard<'static, Option<Arc<ClientFactory>>> {
    match FACTORY.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Global factory lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Install `factory` as the process-wide one, replacing any previous one.
pub fn install(factory: Arc<ClientFactory>) -> Arc<ClientFactory> {
    *slot_write() = Some(factory.clone());
    factory
}

pub fn factory() -> Option<Arc<ClientFactory>> {
    slot_read().clone()
}

/// The installed factory, or one built by `init` and installed.
pub fn get_or_init<E>(
    init: impl FnOnce() -> Result<ClientFactory, E>,
) -> Result<Arc<ClientFactory>, E> {
    let mut slot = slot_write();
    if let Some(existing) = slot.as_ref() {
        return Ok(existing.clone());
    }
    let factory = Arc::new(init()?);
    *slot = Some(factory.clone());
    Ok(factory)
}

/// Remove the installed factory. Meant for tests.
pub fn reset() {
    *slot_write() = None;
}
