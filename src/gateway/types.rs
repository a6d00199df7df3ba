//! Gateway data types: channels, messages, events.

use super::ids::{CategoryId, ChannelId, MemberId, MessageId};
use chrono::{DateTime, Utc};

/// A channel as the platform sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    /// Parent category, if the channel is parented at all.
    pub category: Option<CategoryId>,
    /// Ordering position within the category. Higher is lower on screen.
    pub position: u32,
}

/// A message, as delivered by the gateway or fetched from history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: MemberId,
    /// Whether the author is a bot account (including this bot).
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Additional channel attributes applied together with a category move.
///
/// Bundling these into [`super::Gateway::move_channel`] keeps the move
/// atomic from an observer's point of view: the channel never sits in the
/// new category with stale topic or unsynced permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelEdits {
    /// New channel topic, if it should change.
    pub topic: Option<String>,
    /// Re-sync permission overwrites with the target category.
    pub sync_permissions: bool,
}

/// Events consumed by the pool manager.
///
/// The embedding bot subscribes to these for all channels; the pool filters
/// internally to its three managed categories.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A message was created.
    MessageCreated(MessageInfo),
    /// A message was deleted.
    MessageDeleted {
        channel: ChannelId,
        message: MessageId,
    },
}
