//! Rate-limited staff notifications.
//!
//! When the pool degrades (name exhaustion, unrecoverable claimant), staff
//! get a ping in a configured channel. A token bucket caps this at one
//! notification per configured interval so a stuck pool cannot flood the
//! staff channel.

use crate::config::{NotificationsConfig, RolesConfig};
use crate::gateway::{ChannelId, Gateway, RoleId};
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Sends rate-limited notifications to the staff channel.
pub struct StaffNotifier {
    gateway: Arc<dyn Gateway>,
    channel: ChannelId,
    mention_roles: Vec<RoleId>,
    limiter: DirectRateLimiter,
}

impl StaffNotifier {
    /// Create a notifier from configuration.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        notifications: &NotificationsConfig,
        roles: &RolesConfig,
    ) -> Self {
        let period = notifications.minimum_interval().max(Duration::from_secs(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_minute(std::num::NonZeroU32::MIN));
        Self {
            gateway,
            channel: notifications.channel,
            mention_roles: roles.notify.clone(),
            limiter: GovRateLimiter::direct(quota),
        }
    }

    /// Send `text` to the staff channel, prefixed with the configured role
    /// mentions. Dropped silently (with a debug log) inside the minimum
    /// interval; send failures are logged and swallowed.
    pub async fn notify(&self, text: &str) {
        if self.limiter.check().is_err() {
            debug!(text, "Staff notification suppressed by rate limit");
            return;
        }

        let content = if self.mention_roles.is_empty() {
            text.to_string()
        } else {
            let mentions: Vec<String> = self
                .mention_roles
                .iter()
                .map(|r| format!("<@&{r}>"))
                .collect();
            format!("{} {}", mentions.join(" "), text)
        };

        match self.gateway.send_message(self.channel, &content).await {
            Ok(_) => crate::metrics::record_staff_notification(),
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Failed to send staff notification");
            }
        }
    }
}
