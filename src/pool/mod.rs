//! The help-channel pool.
//!
//! Submodules, leaves first:
//! - [`names`]: deduplicated channel name allocation
//! - [`mover`]: category moves with banner bookkeeping
//! - [`cooldown`]: claim cooldown role management
//! - [`idle`]: closing-time computation
//! - [`manager`]: the orchestrating state machine

pub mod cooldown;
pub mod idle;
pub mod manager;
pub mod mover;
pub mod names;

pub use manager::PoolManager;

use crate::gateway::{ChannelId, MemberId};

/// Keys for the pool's scheduled tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// The pending dormancy check for an In-Use channel.
    Idle(ChannelId),
    /// The pending cooldown role removal for a claimant.
    Cooldown(MemberId),
}

/// Why a session ended. Doubles as the `closed_on` metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Manual close command by the claimant or staff.
    Command,
    /// Claimant idle window elapsed.
    Inactive,
    /// The channel held no human messages (deleted, or never had any).
    Deleted,
}

impl CloseReason {
    /// Static label for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
        }
    }
}

/// How an unclaim was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnclaimKind {
    /// The close command surface.
    Command,
    /// The idle-dormancy task firing. The task must not cancel itself,
    /// so unclaim skips the idle-task cancellation for this kind.
    Auto(CloseReason),
}

impl UnclaimKind {
    /// The close reason for statistics.
    pub fn reason(self) -> CloseReason {
        match self {
            Self::Command => CloseReason::Command,
            Self::Auto(reason) => reason,
        }
    }

    /// Whether this unclaim is the idle task itself firing.
    pub fn is_idle_task(self) -> bool {
        matches!(self, Self::Auto(_))
    }
}

/// Banner posted when a channel becomes claimable.
pub const AVAILABLE_BANNER: &str = "**This channel is available.**\n\
Send your question here to claim the channel. After you claim it, the \
channel moves to the In-Use area and is yours until it has been inactive \
for a while.";

/// Banner posted when a channel returns to reserve.
pub const DORMANT_BANNER: &str = "**This channel is dormant.**\n\
The help session here has ended. The channel will be recycled into the \
Available area when the pool needs it; please don't send new messages here.";

/// Prefix of the machine-generated claim marker. Recovery scans for this
/// when the claim cache has no entry for an In-Use channel.
pub const CLAIMED_BY_MARKER: &str = "Channel claimed by";

/// Whether a message body is one of the pool's banners.
pub fn is_banner(content: &str) -> bool {
    content == AVAILABLE_BANNER || content == DORMANT_BANNER
}

/// Format the claim marker for a claimant mention.
pub fn claim_marker(claimant: MemberId) -> String {
    format!("{CLAIMED_BY_MARKER} <@{claimant}>.")
}

/// Parse the claimant mention out of a claim marker message, if present.
pub fn parse_claim_marker(content: &str) -> Option<MemberId> {
    let rest = content.strip_prefix(CLAIMED_BY_MARKER)?;
    let start = rest.find("<@")? + 2;
    let digits: String = rest[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().ok().map(MemberId)
}
