//! Channel category moves.
//!
//! Moving a channel between the three buckets is the externally visible
//! half of every transition. The move itself must succeed for a transition
//! to count; banner bookkeeping around it is best-effort.

use super::{AVAILABLE_BANNER, DORMANT_BANNER, is_banner};
use crate::config::CategoriesConfig;
use crate::error::GatewayError;
use crate::gateway::{CategoryId, ChannelEdits, ChannelId, Gateway};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many recent messages to inspect when looking for an existing banner.
const BANNER_LOOKBACK: usize = 10;

/// Moves channels between the managed categories and keeps their banner
/// message current.
pub struct ChannelMover {
    gateway: Arc<dyn Gateway>,
    categories: CategoriesConfig,
}

impl ChannelMover {
    /// Create a mover over the three configured categories.
    pub fn new(gateway: Arc<dyn Gateway>, categories: CategoriesConfig) -> Self {
        Self {
            gateway,
            categories,
        }
    }

    /// Move `channel` to the end of `category`'s ordering, applying `edits`
    /// in the same call.
    ///
    /// The category's channel list is re-fetched immediately before the
    /// position is computed, so "bottom" stays correct even when other
    /// moves landed since the caller last looked.
    pub async fn move_to_bottom(
        &self,
        channel: ChannelId,
        category: CategoryId,
        edits: ChannelEdits,
    ) -> Result<(), GatewayError> {
        let siblings = self.gateway.channels_in(category).await?;
        let bottom = siblings
            .iter()
            .filter(|c| c.id != channel)
            .map(|c| c.position)
            .max()
            .map_or(0, |p| p + 1);

        debug!(%channel, %category, position = bottom, "Moving channel to category bottom");
        self.gateway
            .move_channel(channel, category, bottom, edits)
            .await
    }

    /// Make `channel` claimable: refresh the Available banner (editing a
    /// prior Dormant banner in place rather than posting a duplicate), then
    /// move it to the bottom of the Available category.
    pub async fn move_to_available(&self, channel: ChannelId) -> Result<(), GatewayError> {
        self.ensure_banner(channel, AVAILABLE_BANNER).await;
        self.move_to_bottom(
            channel,
            self.categories.available,
            ChannelEdits {
                sync_permissions: true,
                ..Default::default()
            },
        )
        .await
    }

    /// Move `channel` into the In-Use category.
    pub async fn move_to_in_use(&self, channel: ChannelId) -> Result<(), GatewayError> {
        self.move_to_bottom(channel, self.categories.in_use, ChannelEdits::default())
            .await
    }

    /// Return `channel` to reserve: move it to the Dormant category, then
    /// post the Dormant banner.
    pub async fn move_to_dormant(&self, channel: ChannelId) -> Result<(), GatewayError> {
        self.move_to_bottom(
            channel,
            self.categories.dormant,
            ChannelEdits {
                sync_permissions: true,
                ..Default::default()
            },
        )
        .await?;
        self.ensure_banner(channel, DORMANT_BANNER).await;
        Ok(())
    }

    /// Post `text` as the channel's banner, editing the most recent existing
    /// banner in place when one is within reach. Best-effort: failures are
    /// logged, never propagated.
    async fn ensure_banner(&self, channel: ChannelId, text: &str) {
        let bot = self.gateway.current_user();

        let existing = match self.gateway.recent_messages(channel, BANNER_LOOKBACK).await {
            Ok(messages) => messages
                .into_iter()
                .find(|m| m.author == bot && is_banner(&m.content)),
            Err(e) => {
                debug!(%channel, error = %e, "Could not scan for an existing banner");
                None
            }
        };

        let result = match existing {
            Some(banner) if banner.content == text => return,
            Some(banner) => self.gateway.edit_message(channel, banner.id, text).await,
            None => self.gateway.send_message(channel, text).await.map(|_| ()),
        };

        if let Err(e) = result {
            warn!(%channel, error = %e, "Failed to update channel banner");
        }
    }
}
