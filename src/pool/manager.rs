//! The pool manager: the orchestrating state machine.
//!
//! Owns every transition decision. Channels cycle Dormant -> Available ->
//! In-Use -> Dormant; the manager reacts to gateway events, serializes
//! per-channel and per-claimant work through advisory locks, and keeps the
//! Available pool at its configured target.

use super::cooldown::CooldownManager;
use super::idle::{self, ClosingTime};
use super::mover::ChannelMover;
use super::names::build_name_queue;
use super::{
    CLAIMED_BY_MARKER, CloseReason, TaskKey, UnclaimKind, claim_marker, is_banner,
    parse_claim_marker,
};
use crate::config::Config;
use crate::db::{ClaimRecord, Database};
use crate::error::{PoolError, PoolResult};
use crate::gateway::{ChannelId, Gateway, GatewayEvent, MemberId, MessageInfo};
use crate::locks::KeyedLocks;
use crate::metrics;
use crate::notify::StaffNotifier;
use crate::scheduler::{TaskScheduler, spawn_detached};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// How many recent messages the activity scan inspects.
const ACTIVITY_LOOKBACK: usize = 50;

/// What a history scan found since the channel's banner.
#[derive(Debug, Clone, Copy)]
struct Activity {
    /// Any message at all (bot or human).
    any: bool,
    /// Any non-bot message.
    human: bool,
}

/// The help-channel pool state machine.
pub struct PoolManager {
    config: Config,
    gateway: Arc<dyn Gateway>,
    db: Database,
    scheduler: Arc<TaskScheduler<TaskKey>>,
    cooldown: Arc<CooldownManager>,
    mover: ChannelMover,
    notifier: StaffNotifier,
    channel_locks: KeyedLocks<ChannelId>,
    claimant_locks: KeyedLocks<MemberId>,
    /// Rotation queue of Dormant channels awaiting promotion. Unclaims
    /// produce; `available_candidate` is the single logical consumer.
    queue_tx: mpsc::UnboundedSender<ChannelId>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<ChannelId>>,
    name_queue: Mutex<VecDeque<String>>,
}

impl PoolManager {
    /// Build a pool manager. Call [`PoolManager::init`] before feeding
    /// events in.
    pub fn new(config: Config, gateway: Arc<dyn Gateway>, db: Database) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let cooldown = Arc::new(CooldownManager::new(
            Arc::clone(&gateway),
            config.roles.cooldown,
            config.pool.claim_window(),
        ));
        let mover = ChannelMover::new(Arc::clone(&gateway), config.categories);
        let notifier = StaffNotifier::new(
            Arc::clone(&gateway),
            &config.notifications,
            &config.roles,
        );

        Arc::new(Self {
            config,
            gateway,
            db,
            scheduler: TaskScheduler::new(),
            cooldown,
            mover,
            notifier,
            channel_locks: KeyedLocks::new(),
            claimant_locks: KeyedLocks::new(),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            name_queue: Mutex::new(VecDeque::new()),
        })
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Reconcile persisted and platform state after a (re)start: rebuild the
    /// name and rotation queues, converge the Available pool on its target,
    /// restore cooldown roles, and reschedule idle checks for every In-Use
    /// channel.
    pub async fn init(self: &Arc<Self>) -> PoolResult {
        if let Err(problems) = crate::config::validate(&self.config) {
            for problem in &problems {
                error!(error = %problem, "Configuration invalid");
            }
            return Err(PoolError::Config(problems));
        }

        *self.name_queue.lock().await = self.rebuild_name_queue().await?;

        let mut dormant = self
            .gateway
            .channels_in(self.config.categories.dormant)
            .await?;
        dormant.sort_by_key(|c| c.position);
        for channel in &dormant {
            let _ = self.queue_tx.send(channel.id);
        }
        info!(count = dormant.len(), "Seeded rotation queue from Dormant category");

        self.init_available().await?;
        self.cooldown
            .check_cooldowns(&self.db, &self.scheduler)
            .await?;

        let in_use = self
            .gateway
            .channels_in(self.config.categories.in_use)
            .await?;
        for channel in &in_use {
            self.schedule_idle_check_in(Duration::ZERO, channel.id);
        }
        info!(count = in_use.len(), "Rescheduled idle checks for In-Use channels");

        self.report_category_sizes().await;
        Ok(())
    }

    /// Converge the Available category on `max_available`: top it up from
    /// the rotation queue, or return the surplus (a crash mid-transition can
    /// leave one) to Dormant.
    async fn init_available(self: &Arc<Self>) -> PoolResult {
        let available = self
            .gateway
            .channels_in(self.config.categories.available)
            .await?;
        let count = available.len() as u32;
        let target = self.config.pool.max_available;

        if count < target {
            info!(count, target, "Topping up Available channels");
            // No events flow during startup, so nothing could unblock a
            // cooperative wait here; top up best-effort instead.
            for _ in count..target {
                let Some(channel) = self.try_available_candidate().await? else {
                    metrics::record_names_exhausted();
                    warn!("Pool exhausted during startup; Available stays below target");
                    self.notifier
                        .notify(
                            "The help channel pool started below its Available target: \
                             no dormant channels and no unused names remain.",
                        )
                        .await;
                    break;
                };
                self.mover.move_to_available(channel).await?;
                metrics::record_made_available();
            }
        } else if count > target {
            let surplus = (count - target) as usize;
            warn!(count, target, "Surplus Available channels; returning them to Dormant");
            let mut by_position = available;
            by_position.sort_by_key(|c| c.position);
            for channel in by_position.into_iter().rev().take(surplus) {
                self.mover.move_to_dormant(channel.id).await?;
                let _ = self.queue_tx.send(channel.id);
            }
        }
        Ok(())
    }

    /// Cancel all pending scheduled work (teardown).
    pub fn shutdown(&self) {
        self.scheduler.cancel_all();
    }

    // ========================================================================
    // Event dispatch
    // ========================================================================

    /// Consume gateway events until the sender side closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<GatewayEvent>) {
        info!("Help channel pool event loop started");
        while let Some(event) = events.recv().await {
            let result = match event {
                GatewayEvent::MessageCreated(message) => self.handle_message(&message).await,
                GatewayEvent::MessageDeleted { channel, .. } => {
                    self.handle_message_delete(channel).await
                }
            };
            if let Err(e) = result {
                warn!(error = %e, code = e.error_code(), "Event handling failed");
            }
        }
        info!("Help channel pool event loop stopped");
    }

    /// React to a new message: a human message in an Available channel is a
    /// claim; in an In-Use channel it refreshes the activity timestamps.
    pub async fn handle_message(self: &Arc<Self>, message: &MessageInfo) -> PoolResult {
        if message.author_is_bot {
            return Ok(());
        }

        let Some(info) = self.gateway.channel_info(message.channel_id).await? else {
            return Ok(());
        };
        match info.category {
            Some(c) if c == self.config.categories.available => self.claim_channel(message).await,
            Some(c) if c == self.config.categories.in_use => self.update_activity(message).await,
            _ => Ok(()),
        }
    }

    /// React to a message deletion: when the last human message of an
    /// In-Use channel disappears, shorten its idle deadline to the
    /// empty-channel window instead of waiting out the full one.
    pub async fn handle_message_delete(self: &Arc<Self>, channel: ChannelId) -> PoolResult {
        let Some(info) = self.gateway.channel_info(channel).await? else {
            return Ok(());
        };
        if info.category != Some(self.config.categories.in_use) {
            return Ok(());
        }
        let Some(claim) = self.db.claims().get(channel).await? else {
            return Ok(());
        };

        let activity = self.channel_activity(channel).await;
        if !activity.human {
            let deadline = claim.claimed_at + to_chrono(self.config.pool.deleted_idle_window());
            debug!(%channel, %deadline, "Last human message deleted; shortening idle deadline");
            self.schedule_idle_check_at(deadline, channel);
        }
        Ok(())
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Available -> In-Use. Triggered by a human message in an Available
    /// channel.
    pub async fn claim_channel(self: &Arc<Self>, message: &MessageInfo) -> PoolResult {
        let channel = message.channel_id;
        let claimant = message.author;
        let _guard = self.channel_locks.lock(channel).await;

        // Re-check under the lock: a near-simultaneous second message may
        // have claimed the channel already.
        let still_available = self
            .gateway
            .channel_info(channel)
            .await?
            .is_some_and(|c| c.category == Some(self.config.categories.available));
        if !still_available {
            debug!(%channel, "Claim race lost; channel no longer Available");
            return Ok(());
        }

        info!(%channel, %claimant, "Channel claimed");
        self.mover.move_to_in_use(channel).await?;

        let question_pinned = match self.gateway.pin_message(channel, message.id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%channel, error = %e, "Failed to pin question message");
                false
            }
        };

        // The marker doubles as the recovery breadcrumb when the cache is
        // lost, so it goes out even though it is cosmetic here.
        if let Err(e) = self
            .gateway
            .send_message(channel, &claim_marker(claimant))
            .await
        {
            warn!(%channel, error = %e, "Failed to send claim marker");
        }

        if let Err(e) = self
            .gateway
            .dm_member(
                claimant,
                "You claimed a help channel. It stays yours until it has been \
                 inactive for a while; close it with the close command when \
                 your question is answered.",
            )
            .await
        {
            debug!(%claimant, error = %e, "Could not DM claim summary");
        }

        self.cooldown
            .revoke_send_permissions(claimant, &self.scheduler)
            .await;

        // Cache bookkeeping completes before the claim is acknowledged.
        let record = ClaimRecord {
            channel_id: channel,
            claimant_id: claimant,
            claimed_at: message.created_at,
            last_claimant_message_at: Some(message.created_at),
            last_other_message_at: None,
            answered: false,
            question_message_id: question_pinned.then_some(message.id),
        };
        self.db.claims().save(&record).await?;

        self.schedule_idle_check_in(self.config.pool.idle_window(), channel);
        metrics::record_claim();

        // Replenishment may wait indefinitely for a dormant channel, so it
        // races ahead of the claim path.
        let manager = Arc::clone(self);
        spawn_detached("replenish_available", async move {
            manager.move_to_available().await.map_err(anyhow::Error::from)
        });

        Ok(())
    }

    /// Dormant -> Available. Pulls the next rotation-queue candidate,
    /// creating a fresh channel when the queue runs dry; blocks
    /// cooperatively once the name pool is exhausted too.
    pub async fn move_to_available(self: &Arc<Self>) -> PoolResult {
        let channel = self.available_candidate().await?;
        self.mover.move_to_available(channel).await?;
        metrics::record_made_available();
        info!(%channel, "Channel made Available");
        Ok(())
    }

    /// In-Use -> Dormant.
    pub async fn unclaim_channel(
        self: &Arc<Self>,
        channel: ChannelId,
        kind: UnclaimKind,
    ) -> PoolResult {
        let _guard = self.channel_locks.lock(channel).await;

        // A manual close and the idle timeout can race here. Whoever wins
        // moves the channel out of In-Use; the loser must not run the
        // whole close again. Externally deleted channels still get their
        // cleanup pass.
        if let Some(info) = self.gateway.channel_info(channel).await?
            && info.category != Some(self.config.categories.in_use)
        {
            debug!(%channel, "Channel no longer In-Use; unclaim already handled");
            return Ok(());
        }

        let claim = match self.db.claims().get(channel).await? {
            Some(claim) => claim,
            None => self.recover_claim(channel).await,
        };

        // Serialize against a concurrent unclaim for the same member
        // (manual close racing the idle timeout on another channel).
        let _claimant_guard = self.claimant_locks.lock(claim.claimant_id).await;

        self.db.claims().delete(channel).await?;

        let remaining = self
            .db
            .claims()
            .claims_for_member(claim.claimant_id)
            .await?;
        if remaining == 0 {
            self.cooldown.remove_cooldown_role(claim.claimant_id).await;
            self.scheduler.cancel(&TaskKey::Cooldown(claim.claimant_id));
        } else {
            debug!(
                claimant = %claim.claimant_id,
                remaining,
                "Claimant still holds channels; cooldown role stays"
            );
        }

        if !kind.is_idle_task() {
            self.scheduler.cancel(&TaskKey::Idle(channel));
        }

        if let Some(question) = claim.question_message_id
            && let Err(e) = self.gateway.unpin_message(channel, question).await
        {
            debug!(%channel, error = %e, "Failed to unpin question message");
        }

        let duration = (Utc::now() - claim.claimed_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let reason = kind.reason();
        info!(
            %channel,
            claimant = %claim.claimant_id,
            closed_on = reason.as_str(),
            answered = claim.answered,
            duration_secs = duration.as_secs(),
            "Session closed"
        );
        metrics::record_session_closed(reason.as_str(), claim.answered, duration.as_secs_f64());

        // The move is the purpose of this transition: its failure fails
        // the unclaim, unlike all the bookkeeping above.
        self.mover.move_to_dormant(channel).await?;
        let _ = self.queue_tx.send(channel);

        self.channel_locks.prune();
        self.claimant_locks.prune();
        Ok(())
    }

    /// Idle check for an In-Use channel: close it when its deadline has
    /// passed, otherwise reschedule for the remainder.
    pub async fn move_idle_channel(self: &Arc<Self>, channel: ChannelId) -> PoolResult {
        let Some(claim) = self.db.claims().get(channel).await? else {
            let still_in_use = self
                .gateway
                .channel_info(channel)
                .await?
                .is_some_and(|c| c.category == Some(self.config.categories.in_use));
            if !still_in_use {
                debug!(%channel, "Idle check raced a close; nothing to do");
                return Ok(());
            }
            // An In-Use channel with no cached claim means the cache was
            // lost (crash, wiped database). Close it through the normal
            // path; the unclaim recovers the claimant from the marker.
            warn!(%channel, "In-Use channel has no cached claim; closing via recovery");
            return self
                .unclaim_channel(channel, UnclaimKind::Auto(CloseReason::Inactive))
                .await;
        };

        let activity = self.channel_activity(channel).await;
        let ClosingTime { at, reason } = idle::closing_time(
            &claim,
            self.config.pool.idle_window(),
            self.config.pool.deleted_idle_window(),
            activity.any,
            activity.human,
        );

        let now = Utc::now();
        if at <= now {
            info!(%channel, closed_on = reason.as_str(), "Idle deadline passed; unclaiming");
            self.unclaim_channel(channel, UnclaimKind::Auto(reason))
                .await
        } else {
            debug!(%channel, deadline = %at, "Channel still active; rescheduling idle check");
            self.schedule_idle_check_at(at, channel);
            Ok(())
        }
    }

    /// The manual close command surface. Permitted for the current claimant
    /// and for members holding a whitelisted role.
    pub async fn close_channel(
        self: &Arc<Self>,
        channel: ChannelId,
        invoker: MemberId,
    ) -> PoolResult {
        let in_use = self
            .gateway
            .channel_info(channel)
            .await?
            .is_some_and(|c| c.category == Some(self.config.categories.in_use));
        if !in_use {
            return Err(PoolError::NotPermitted);
        }

        let claim = self.db.claims().get(channel).await?;
        let is_claimant = claim.as_ref().is_some_and(|c| c.claimant_id == invoker);
        if !is_claimant && !self.has_whitelisted_role(invoker).await {
            return Err(PoolError::NotPermitted);
        }

        self.unclaim_channel(channel, UnclaimKind::Command).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn has_whitelisted_role(&self, member: MemberId) -> bool {
        if self.config.roles.command_whitelist.is_empty() {
            return false;
        }
        match self.gateway.member_roles(member).await {
            Ok(roles) => roles
                .iter()
                .any(|r| self.config.roles.command_whitelist.contains(r)),
            Err(e) => {
                debug!(%member, error = %e, "Could not fetch member roles");
                false
            }
        }
    }

    /// Next channel to promote without waiting: rotation queue first, then a
    /// freshly created one. `None` when the pool is exhausted.
    async fn try_available_candidate(&self) -> Result<Option<ChannelId>, PoolError> {
        if let Ok(channel) = self.queue_rx.lock().await.try_recv() {
            return Ok(Some(channel));
        }
        self.create_dormant_channel().await
    }

    /// Next channel to promote: rotation queue first, then a freshly
    /// created one, then a cooperative wait for some session to close.
    async fn available_candidate(&self) -> Result<ChannelId, PoolError> {
        let mut queue = self.queue_rx.lock().await;
        if let Ok(channel) = queue.try_recv() {
            return Ok(channel);
        }
        if let Some(channel) = self.create_dormant_channel().await? {
            return Ok(channel);
        }

        metrics::record_names_exhausted();
        warn!("Dormant pool empty and name pool exhausted; waiting for an unclaim");
        self.notifier
            .notify(
                "The help channel pool is exhausted: no dormant channels and no \
                 unused names remain. A channel becomes available again when a \
                 session closes.",
            )
            .await;

        queue.recv().await.ok_or(PoolError::QueueClosed)
    }

    /// Create a brand-new Dormant channel from the name queue, or `None`
    /// when every name is in use.
    async fn create_dormant_channel(&self) -> Result<Option<ChannelId>, PoolError> {
        let mut names = self.name_queue.lock().await;
        if names.is_empty() {
            *names = self.rebuild_name_queue().await?;
        }
        let Some(name) = names.pop_front() else {
            return Ok(None);
        };
        drop(names);

        let info = self
            .gateway
            .create_channel(self.config.categories.dormant, &name)
            .await?;
        info!(channel = %info.id, name = %info.name, "Created new dormant channel");
        Ok(Some(info.id))
    }

    async fn rebuild_name_queue(&self) -> Result<VecDeque<String>, PoolError> {
        let mut used = Vec::new();
        for category in [
            self.config.categories.available,
            self.config.categories.in_use,
            self.config.categories.dormant,
        ] {
            used.extend(
                self.gateway
                    .channels_in(category)
                    .await?
                    .into_iter()
                    .map(|c| c.name),
            );
        }
        Ok(build_name_queue(
            &self.config,
            used.iter().map(String::as_str),
        ))
    }

    /// Refresh the claim cache timestamps for a message in an In-Use
    /// channel. The first non-claimant message marks the session answered.
    async fn update_activity(&self, message: &MessageInfo) -> PoolResult {
        let channel = message.channel_id;
        let Some(claim) = self.db.claims().get(channel).await? else {
            debug!(%channel, "Message in In-Use channel with no cached claim");
            return Ok(());
        };

        if message.author == claim.claimant_id {
            self.db
                .claims()
                .set_last_claimant_message(channel, message.created_at)
                .await?;
        } else {
            self.db
                .claims()
                .set_last_other_message(channel, message.created_at)
                .await?;
            if !claim.answered {
                self.db.claims().set_answered(channel, true).await?;
            }
        }
        Ok(())
    }

    /// Scan recent history for messages since the channel's banner. A
    /// deleted channel reads as "no messages", which closes it immediately.
    async fn channel_activity(&self, channel: ChannelId) -> Activity {
        let messages = match self
            .gateway
            .recent_messages(channel, ACTIVITY_LOOKBACK)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                debug!(%channel, error = %e, "History scan failed; treating channel as empty");
                return Activity {
                    any: false,
                    human: false,
                };
            }
        };

        let bot = self.gateway.current_user();
        let mut activity = Activity {
            any: false,
            human: false,
        };
        for message in &messages {
            // Newest first; stop at the banner that opened this lifecycle.
            if message.author == bot && is_banner(&message.content) {
                break;
            }
            activity.any = true;
            if !message.author_is_bot {
                activity.human = true;
            }
        }
        activity
    }

    /// Rebuild a claim record for a channel the cache has forgotten
    /// (crash/restart races): scan for the machine-generated claim marker,
    /// falling back to the bot itself as a sentinel claimant so the channel
    /// can still close gracefully.
    async fn recover_claim(&self, channel: ChannelId) -> ClaimRecord {
        metrics::record_recovery();
        let bot = self.gateway.current_user();

        let messages = self
            .gateway
            .recent_messages(channel, self.config.pool.missing_claimant_lookback)
            .await
            .unwrap_or_default();

        let marker = messages
            .iter()
            .filter(|m| m.author == bot && m.content.starts_with(CLAIMED_BY_MARKER))
            .find_map(|m| parse_claim_marker(&m.content).map(|id| (id, m.created_at)));

        let (claimant_id, claimed_at) = match marker {
            Some(found) => {
                warn!(%channel, claimant = %found.0, "Recovered claimant from claim marker");
                found
            }
            None => {
                warn!(%channel, "No claim marker found; assigning the bot as claimant");
                self.notifier
                    .notify(&format!(
                        "Help channel <#{channel}> had no claimant on record and no \
                         claim marker in its recent history; closing it as the bot."
                    ))
                    .await;
                (bot, Utc::now())
            }
        };

        ClaimRecord {
            channel_id: channel,
            claimant_id,
            claimed_at,
            last_claimant_message_at: None,
            last_other_message_at: None,
            answered: false,
            question_message_id: None,
        }
    }

    fn schedule_idle_check_in(self: &Arc<Self>, delay: Duration, channel: ChannelId) {
        let manager = Arc::clone(self);
        self.scheduler
            .schedule_later(delay, TaskKey::Idle(channel), async move {
                manager
                    .move_idle_channel(channel)
                    .await
                    .map_err(anyhow::Error::from)
            });
    }

    fn schedule_idle_check_at(self: &Arc<Self>, at: DateTime<Utc>, channel: ChannelId) {
        let manager = Arc::clone(self);
        self.scheduler
            .schedule_at(at, TaskKey::Idle(channel), async move {
                manager
                    .move_idle_channel(channel)
                    .await
                    .map_err(anyhow::Error::from)
            });
    }

    async fn report_category_sizes(&self) {
        let mut sizes = [0i64; 3];
        for (i, category) in [
            self.config.categories.available,
            self.config.categories.in_use,
            self.config.categories.dormant,
        ]
        .into_iter()
        .enumerate()
        {
            match self.gateway.channels_in(category).await {
                Ok(channels) => sizes[i] = channels.len() as i64,
                Err(e) => debug!(%category, error = %e, "Could not count category channels"),
            }
        }
        metrics::set_category_sizes(sizes[0], sizes[1], sizes[2]);
    }

    // ========================================================================
    // Test observability
    // ========================================================================

    /// Whether an idle check is pending for `channel`.
    pub fn has_pending_idle_check(&self, channel: ChannelId) -> bool {
        self.scheduler.contains(&TaskKey::Idle(channel))
    }

    /// Whether a cooldown removal is pending for `member`.
    pub fn has_pending_cooldown(&self, member: MemberId) -> bool {
        self.scheduler.contains(&TaskKey::Cooldown(member))
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}
