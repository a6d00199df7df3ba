//! Closing-time computation for In-Use channels.
//!
//! Pure deadline arithmetic, separated from the manager so the tie-break
//! policy is testable without a gateway: with both claimant and
//! non-claimant deadlines known, the one furthest in the future wins — a
//! session never closes early just because one party went idle.

use super::CloseReason;
use crate::db::ClaimRecord;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// When an In-Use channel should go dormant, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosingTime {
    pub at: DateTime<Utc>,
    pub reason: CloseReason,
}

/// Compute the dormancy deadline for a claimed channel.
///
/// `has_any_messages` / `has_human_messages` describe what a history scan
/// found since the channel's banner: a channel with no messages at all
/// closes immediately, one holding only bot messages gets the short
/// empty-channel window, and a live session gets the furthest-future of
/// the per-party idle deadlines.
pub fn closing_time(
    claim: &ClaimRecord,
    idle_window: Duration,
    deleted_idle_window: Duration,
    has_any_messages: bool,
    has_human_messages: bool,
) -> ClosingTime {
    if !has_any_messages {
        return ClosingTime {
            at: claim.claimed_at,
            reason: CloseReason::Deleted,
        };
    }

    if !has_human_messages {
        return ClosingTime {
            at: claim.claimed_at + to_chrono(deleted_idle_window),
            reason: CloseReason::Deleted,
        };
    }

    let idle = to_chrono(idle_window);
    let claimant_deadline = claim
        .last_claimant_message_at
        .unwrap_or(claim.claimed_at)
        + idle;

    let at = match claim.last_other_message_at {
        Some(other) => claimant_deadline.max(other + idle),
        None => claimant_deadline,
    };

    ClosingTime {
        at,
        reason: CloseReason::Inactive,
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChannelId, MemberId};

    const IDLE: Duration = Duration::from_secs(30 * 60);
    const DELETED_IDLE: Duration = Duration::from_secs(5 * 60);

    fn claim(
        claimed_at: DateTime<Utc>,
        last_claimant: Option<DateTime<Utc>>,
        last_other: Option<DateTime<Utc>>,
    ) -> ClaimRecord {
        ClaimRecord {
            channel_id: ChannelId(1),
            claimant_id: MemberId(2),
            claimed_at,
            last_claimant_message_at: last_claimant,
            last_other_message_at: last_other,
            answered: last_other.is_some(),
            question_message_id: None,
        }
    }

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_furthest_future_deadline_wins() {
        let t0 = base();
        let claimant_at = t0 + chrono::Duration::minutes(1);
        let other_at = t0 + chrono::Duration::minutes(10);

        let ct = closing_time(
            &claim(t0, Some(claimant_at), Some(other_at)),
            IDLE,
            DELETED_IDLE,
            true,
            true,
        );
        assert_eq!(ct.at, other_at + chrono::Duration::minutes(30));
        assert_eq!(ct.reason, CloseReason::Inactive);

        // Swapped: claimant spoke later.
        let ct = closing_time(
            &claim(t0, Some(other_at), Some(claimant_at)),
            IDLE,
            DELETED_IDLE,
            true,
            true,
        );
        assert_eq!(ct.at, other_at + chrono::Duration::minutes(30));
    }

    #[test]
    fn test_no_other_activity_uses_claimant_deadline() {
        let t0 = base();
        let claimant_at = t0 + chrono::Duration::minutes(3);

        let ct = closing_time(
            &claim(t0, Some(claimant_at), None),
            IDLE,
            DELETED_IDLE,
            true,
            true,
        );
        assert_eq!(ct.at, claimant_at + chrono::Duration::minutes(30));
        assert_eq!(ct.reason, CloseReason::Inactive);
    }

    #[test]
    fn test_no_cached_timestamps_falls_back_to_claim_time() {
        let t0 = base();
        let ct = closing_time(&claim(t0, None, None), IDLE, DELETED_IDLE, true, true);
        assert_eq!(ct.at, t0 + chrono::Duration::minutes(30));
    }

    #[test]
    fn test_only_bot_messages_gets_short_window() {
        let t0 = base();
        let ct = closing_time(&claim(t0, None, None), IDLE, DELETED_IDLE, true, false);
        assert_eq!(ct.at, t0 + chrono::Duration::minutes(5));
        assert_eq!(ct.reason, CloseReason::Deleted);
    }

    #[test]
    fn test_zero_messages_closes_immediately() {
        let t0 = base();
        let ct = closing_time(&claim(t0, None, None), IDLE, DELETED_IDLE, false, false);
        assert_eq!(ct.at, t0);
        assert_eq!(ct.reason, CloseReason::Deleted);
    }
}
