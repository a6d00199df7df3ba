//! Chat-platform gateway seam.
//!
//! The pool manager never talks to a platform SDK directly. The embedding bot
//! implements [`Gateway`] over its SDK (REST calls for channel moves, message
//! edits, role edits) and forwards gateway events ("message created",
//! "message deleted") as [`GatewayEvent`]s. Tests implement the same trait
//! over in-memory state.

mod ids;
mod types;

pub use ids::{CategoryId, ChannelId, MemberId, MessageId, RoleId};
pub use types::{ChannelEdits, ChannelInfo, GatewayEvent, MessageInfo};

use crate::error::GatewayError;
use async_trait::async_trait;

/// Platform operations the pool manager depends on.
///
/// Every method is a suspension point: implementations typically issue a REST
/// call. Failures map onto the [`GatewayError`] taxonomy; the pool treats most
/// of them as transient and logs rather than propagating.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// The bot's own member id. Used as the fallback claimant when recovery
    /// cannot determine who claimed a channel.
    fn current_user(&self) -> MemberId;

    /// List the channels currently parented to `category`, in display order.
    async fn channels_in(&self, category: CategoryId) -> Result<Vec<ChannelInfo>, GatewayError>;

    /// Fetch a single channel, or `None` if it no longer exists.
    async fn channel_info(&self, channel: ChannelId) -> Result<Option<ChannelInfo>, GatewayError>;

    /// Create a text channel named `name` under `category`.
    async fn create_channel(
        &self,
        category: CategoryId,
        name: &str,
    ) -> Result<ChannelInfo, GatewayError>;

    /// Re-parent `channel` to `category` at `position`, applying `edits` in
    /// the same call so no intermediate state is observable.
    async fn move_channel(
        &self,
        channel: ChannelId,
        category: CategoryId,
        position: u32,
        edits: ChannelEdits,
    ) -> Result<(), GatewayError>;

    /// Fetch up to `limit` most recent messages in `channel`, newest first.
    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<MessageInfo>, GatewayError>;

    /// Send a message to `channel`, returning its id.
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, GatewayError>;

    /// Replace the content of a message the bot previously sent.
    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), GatewayError>;

    /// Pin a message in its channel.
    async fn pin_message(&self, channel: ChannelId, message: MessageId)
    -> Result<(), GatewayError>;

    /// Unpin a message. Unpinning an already-unpinned message is a platform
    /// `NotFound`, which callers swallow.
    async fn unpin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), GatewayError>;

    /// Grant `role` to `member`.
    async fn add_role(&self, member: MemberId, role: RoleId) -> Result<(), GatewayError>;

    /// Revoke `role` from `member`.
    async fn remove_role(&self, member: MemberId, role: RoleId) -> Result<(), GatewayError>;

    /// List the roles `member` currently holds.
    async fn member_roles(&self, member: MemberId) -> Result<Vec<RoleId>, GatewayError>;

    /// Send a direct message. Fails with `Forbidden` when the recipient
    /// disallows DMs; callers log and continue.
    async fn dm_member(&self, member: MemberId, content: &str) -> Result<(), GatewayError>;
}
