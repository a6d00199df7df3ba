//! Claim cooldown role management.
//!
//! Claiming a channel puts a temporary role on the claimant that blocks
//! further claims. Removal is scheduled for `claim_minutes` later; an early
//! unclaim removes it sooner, but only once the member holds zero claimed
//! channels. Role edits are idempotent and never abort the surrounding
//! transition.

use super::TaskKey;
use crate::db::Database;
use crate::gateway::{Gateway, MemberId, RoleId};
use crate::scheduler::TaskScheduler;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Grants and revokes the claim cooldown role.
pub struct CooldownManager {
    gateway: Arc<dyn Gateway>,
    role: RoleId,
    claim_window: Duration,
}

impl CooldownManager {
    /// Create a cooldown manager.
    pub fn new(gateway: Arc<dyn Gateway>, role: RoleId, claim_window: Duration) -> Self {
        Self {
            gateway,
            role,
            claim_window,
        }
    }

    /// Add the cooldown role to `member`. Adding an already-present role is
    /// a no-op on the platform side; failures are logged, never propagated.
    pub async fn add_cooldown_role(&self, member: MemberId) {
        match self.gateway.add_role(member, self.role).await {
            Ok(()) => debug!(%member, "Added cooldown role"),
            Err(e) => {
                warn!(%member, error = %e, "Failed to add cooldown role");
            }
        }
    }

    /// Remove the cooldown role from `member`. Removing an absent role (or
    /// from a member who left the guild) is logged and swallowed.
    pub async fn remove_cooldown_role(&self, member: MemberId) {
        match self.gateway.remove_role(member, self.role).await {
            Ok(()) => debug!(%member, "Removed cooldown role"),
            Err(e) => {
                warn!(%member, error = %e, "Failed to remove cooldown role");
            }
        }
    }

    /// Put `member` on claim cooldown: add the role and schedule its removal
    /// after the claim window, replacing any earlier scheduled removal.
    pub async fn revoke_send_permissions(
        self: &Arc<Self>,
        member: MemberId,
        scheduler: &Arc<TaskScheduler<TaskKey>>,
    ) {
        self.add_cooldown_role(member).await;

        let cooldown = Arc::clone(self);
        scheduler.schedule_later(self.claim_window, TaskKey::Cooldown(member), async move {
            cooldown.remove_cooldown_role(member).await;
            Ok(())
        });
    }

    /// Reconcile cooldown roles with the claim cache after a restart.
    ///
    /// Scheduled removals do not survive the process, but the cache does:
    /// for every member with a cached claim, remove the role immediately if
    /// the window already elapsed, otherwise reschedule the remainder.
    pub async fn check_cooldowns(
        self: &Arc<Self>,
        db: &Database,
        scheduler: &Arc<TaskScheduler<TaskKey>>,
    ) -> Result<(), crate::db::DbError> {
        let claims = db.claims().load_all().await?;

        // A member with several claims is on cooldown from the latest one.
        let mut latest: HashMap<MemberId, chrono::DateTime<Utc>> = HashMap::new();
        for claim in claims {
            let entry = latest.entry(claim.claimant_id).or_insert(claim.claimed_at);
            if claim.claimed_at > *entry {
                *entry = claim.claimed_at;
            }
        }

        let now = Utc::now();
        for (member, claimed_at) in latest {
            let elapsed = (now - claimed_at).to_std().unwrap_or(Duration::ZERO);
            if elapsed >= self.claim_window {
                info!(%member, "Cooldown expired during downtime; removing role");
                self.remove_cooldown_role(member).await;
            } else {
                let remaining = self.claim_window - elapsed;
                info!(%member, remaining_secs = remaining.as_secs(), "Rescheduling cooldown removal");
                let cooldown = Arc::clone(self);
                scheduler.schedule_later(remaining, TaskKey::Cooldown(member), async move {
                    cooldown.remove_cooldown_role(member).await;
                    Ok(())
                });
            }
        }
        Ok(())
    }
}
