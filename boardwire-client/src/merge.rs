//! Merge-update for resources whose relationship field is replaced wholesale
//! by the remote on every partial update.
//!
//! Before a partial update that leaves the relationship field unset, the
//! current value is read fresh (never from cache) and copied into the
//! payload. An explicit value from the caller, empty included, is sent as-is.
//!
//! The read and the write are separate requests. A concurrent writer that
//! changes the same field in between will be overwritten with what was read;
//! closing that window needs a server-side precondition the remote does not
//! offer.

use std::future::Future;

use boardwire_core::{CardLink, CardUpdate, ClientResult};
use serde::Serialize;
use tracing::{debug, warn};

/// A partial-update payload carrying a relationship field.
pub trait RelationshipPayload {
    /// Whether the caller set the relationship field explicitly.
    fn has_explicit_relationships(&self) -> bool;

    /// Fill in the relationship field with the observed current value.
    fn preserve_relationships(&mut self, snapshot: Vec<CardLink>);
}

impl RelationshipPayload for CardUpdate {
    fn has_explicit_relationships(&self) -> bool {
        self.linked_cards.is_some()
    }

    fn preserve_relationships(&mut self, snapshot: Vec<CardLink>) {
        self.linked_cards = Some(snapshot);
    }
}

/// What the coordinator did with the relationship field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum MergeDecision {
    /// The caller supplied the field; it was sent untouched.
    Explicit,
    /// The current value was read and sent along with the update.
    Preserved { links: Vec<CardLink> },
    /// The preservation read failed; the update went out without the field
    /// and the remote will have cleared it.
    Unavailable { reason: String },
}

impl MergeDecision {
    /// True when the update may have dropped relationship data.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Runs the read-merge step of a merge-update for one instance.
#[derive(Debug, Clone)]
pub struct MergeUpdateCoordinator {
    instance: String,
}

impl MergeUpdateCoordinator {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Merge the current relationship value into `payload` unless the caller
    /// set it. `read_current` is only invoked when a merge is needed.
    ///
    /// A failing read never fails the update; it is reported as
    /// [`MergeDecision::Unavailable`] and logged as a warning.
    pub async fn merge<P, F, Fut>(
        &self,
        resource: &str,
        payload: &mut P,
        read_current: F,
    ) -> MergeDecision
    where
        P: RelationshipPayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<Vec<CardLink>>>,
    {
        if payload.has_explicit_relationships() {
            debug!(instance = %self.instance, resource, "Relationship field set by caller");
            return MergeDecision::Explicit;
        }

        match read_current().await {
            Ok(links) => {
                debug!(
                    instance = %self.instance,
                    resource,
                    links = links.len(),
                    "Preserving relationship field"
                );
                payload.preserve_relationships(links.clone());
                MergeDecision::Preserved { links }
            }
            Err(err) => {
                warn!(
                    instance = %self.instance,
                    resource,
                    error = %err,
                    "Could not read current relationships; updating without them"
                );
                MergeDecision::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }
}
