//! Cards of one instance.
//!
//! The remote replaces `linked_cards` wholesale on every partial update, so
//! [`Cards::update`] runs the merge-update path: a fresh read of the card's
//! current links is folded into payloads that leave the field unset.

use std::time::Duration;

use boardwire_core::{
    ApiRequest, Card, CardFilter, CardId, CardMove, CardUpdate, ClientResult, NewCard,
};
use serde::Serialize;
use serde_json::Value;

use super::{module_accessors, ModuleCore, Remote};
use crate::merge::{MergeDecision, MergeUpdateCoordinator};
use crate::settings::ClientSettings;

pub const COLLECTION: &str = "cards";
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Result of a card update: the card as the remote returned it and what
/// happened to its relationship field.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub card: Card,
    pub merge: MergeDecision,
}

pub struct Cards {
    core: ModuleCore,
    coordinator: MergeUpdateCoordinator,
}

module_accessors!(Cards);

impl Cards {
    pub(crate) fn new(remote: Remote, settings: &ClientSettings) -> Self {
        let coordinator = MergeUpdateCoordinator::new(remote.instance().id.clone());
        Self {
            core: ModuleCore::new(COLLECTION, remote, settings, DEFAULT_TTL),
            coordinator,
        }
    }

    pub async fn list(&self, filter: &CardFilter) -> ClientResult<Vec<Card>> {
        let key = self.core.key(format!("list:{}", filter.cache_scope()));
        let request = ApiRequest::get("/cards")
            .query_opt("board_ids", filter.board_id)
            .query_opt("column_ids", filter.column_id)
            .query_opt("lane_ids", filter.lane_id);
        self.core.cached(&key, request).await
    }

    pub async fn get(&self, card_id: CardId) -> ClientResult<Card> {
        let key = self.core.key(card_id);
        self.core
            .cached(&key, ApiRequest::get(format!("/cards/{card_id}")))
            .await
    }

    pub async fn create(&self, card: &NewCard) -> ClientResult<Card> {
        let body = serde_json::to_value(card)?;
        self.core
            .write("create card", ApiRequest::post("/cards", body))
            .await
    }

    /// Partially update a card without losing its links.
    ///
    /// When `update.linked_cards` is `None` the current links are read
    /// straight from the remote and sent along. An explicit value, empty
    /// included, is sent as given. A failing preservation read does not fail
    /// the update; the outcome reports it as degraded.
    pub async fn update(
        &self,
        card_id: CardId,
        mut update: CardUpdate,
    ) -> ClientResult<UpdateOutcome> {
        let operation = "update card";
        let remote = self.core.remote();
        remote.ensure_writable(operation)?;

        let resource = format!("card {card_id}");
        let merge = self
            .coordinator
            .merge(&resource, &mut update, || async {
                let current: Card = remote
                    .read(ApiRequest::get(format!("/cards/{card_id}")))
                    .await?;
                Ok(current.linked_cards)
            })
            .await;

        let body = serde_json::to_value(&update)?;
        let card = self
            .core
            .write(operation, ApiRequest::patch(format!("/cards/{card_id}"), body))
            .await?;
        Ok(UpdateOutcome { card, merge })
    }

    /// Move a card to another column (and optionally lane or position).
    /// Goes through the same merge-update path as [`Cards::update`].
    pub async fn move_card(
        &self,
        card_id: CardId,
        target: CardMove,
    ) -> ClientResult<UpdateOutcome> {
        self.update(card_id, target.into_update()).await
    }

    pub async fn delete(&self, card_id: CardId) -> ClientResult<()> {
        let _: Value = self
            .core
            .write("delete card", ApiRequest::delete(format!("/cards/{card_id}")))
            .await?;
        Ok(())
    }
}
