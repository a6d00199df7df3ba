//! In-memory [`Gateway`] implementation.
//!
//! Models just enough of a chat platform for pool tests: channels with a
//! category and position, per-channel message history, pins, member roles,
//! and DMs. Channels can be dropped to simulate external deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helppool::error::GatewayError;
use helppool::gateway::{
    CategoryId, ChannelEdits, ChannelId, ChannelInfo, Gateway, MemberId, MessageId, MessageInfo,
    RoleId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// The mock bot's own member id.
pub const BOT: MemberId = MemberId(1);

#[derive(Default)]
struct State {
    channels: HashMap<ChannelId, ChannelInfo>,
    /// Per-channel history, oldest first.
    messages: HashMap<ChannelId, Vec<MessageInfo>>,
    pins: HashMap<ChannelId, HashSet<MessageId>>,
    roles: HashMap<MemberId, HashSet<RoleId>>,
    dms: Vec<(MemberId, String)>,
}

/// An in-memory chat platform.
pub struct MockGateway {
    next_id: AtomicU64,
    state: Mutex<State>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            state: Mutex::new(State::default()),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Seeding and inspection helpers
    // ------------------------------------------------------------------

    /// Create a channel at the bottom of `category`.
    pub fn add_channel(&self, category: CategoryId, name: &str) -> ChannelId {
        let id = ChannelId(self.allocate_id());
        let mut state = self.state.lock();
        let position = bottom_position(&state.channels, category);
        state.channels.insert(
            id,
            ChannelInfo {
                id,
                name: name.to_string(),
                category: Some(category),
                position,
            },
        );
        id
    }

    /// Create a channel with a fixed id, for channels named in configuration.
    pub fn add_channel_with_id(&self, id: ChannelId, category: CategoryId, name: &str) {
        let mut state = self.state.lock();
        let position = bottom_position(&state.channels, category);
        state.channels.insert(
            id,
            ChannelInfo {
                id,
                name: name.to_string(),
                category: Some(category),
                position,
            },
        );
    }

    /// Drop a channel entirely, simulating an external deletion.
    #[allow(dead_code)]
    pub fn remove_channel(&self, channel: ChannelId) {
        let mut state = self.state.lock();
        state.channels.remove(&channel);
        state.messages.remove(&channel);
        state.pins.remove(&channel);
    }

    /// Record a human message and return it, ready to feed to the pool.
    #[allow(dead_code)]
    pub fn human_message(
        &self,
        channel: ChannelId,
        author: MemberId,
        content: &str,
    ) -> MessageInfo {
        self.push_message(channel, author, false, content, Utc::now())
    }

    /// Record a human message with an explicit timestamp.
    #[allow(dead_code)]
    pub fn human_message_at(
        &self,
        channel: ChannelId,
        author: MemberId,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> MessageInfo {
        self.push_message(channel, author, false, content, created_at)
    }

    fn push_message(
        &self,
        channel: ChannelId,
        author: MemberId,
        author_is_bot: bool,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> MessageInfo {
        let message = MessageInfo {
            id: MessageId(self.allocate_id()),
            channel_id: channel,
            author,
            author_is_bot,
            content: content.to_string(),
            created_at,
        };
        self.state
            .lock()
            .messages
            .entry(channel)
            .or_default()
            .push(message.clone());
        message
    }

    /// Remove a single message from a channel's history.
    #[allow(dead_code)]
    pub fn delete_message(&self, channel: ChannelId, message: MessageId) {
        if let Some(history) = self.state.lock().messages.get_mut(&channel) {
            history.retain(|m| m.id != message);
        }
    }

    pub fn channels_in_category(&self, category: CategoryId) -> Vec<ChannelInfo> {
        let state = self.state.lock();
        let mut channels: Vec<ChannelInfo> = state
            .channels
            .values()
            .filter(|c| c.category == Some(category))
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.position);
        channels
    }

    #[allow(dead_code)]
    pub fn category_of(&self, channel: ChannelId) -> Option<CategoryId> {
        self.state.lock().channels.get(&channel)?.category
    }

    #[allow(dead_code)]
    pub fn has_role(&self, member: MemberId, role: RoleId) -> bool {
        self.state
            .lock()
            .roles
            .get(&member)
            .is_some_and(|r| r.contains(&role))
    }

    /// Grant a role directly, bypassing the pool.
    #[allow(dead_code)]
    pub fn grant_role(&self, member: MemberId, role: RoleId) {
        self.state.lock().roles.entry(member).or_default().insert(role);
    }

    #[allow(dead_code)]
    pub fn pinned_messages(&self, channel: ChannelId) -> Vec<MessageId> {
        self.state
            .lock()
            .pins
            .get(&channel)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default()
    }

    #[allow(dead_code)]
    pub fn message_contents(&self, channel: ChannelId) -> Vec<String> {
        self.state
            .lock()
            .messages
            .get(&channel)
            .map(|h| h.iter().map(|m| m.content.clone()).collect())
            .unwrap_or_default()
    }

    #[allow(dead_code)]
    pub fn dm_count(&self, member: MemberId) -> usize {
        self.state
            .lock()
            .dms
            .iter()
            .filter(|(m, _)| *m == member)
            .count()
    }
}

fn bottom_position(channels: &HashMap<ChannelId, ChannelInfo>, category: CategoryId) -> u32 {
    channels
        .values()
        .filter(|c| c.category == Some(category))
        .map(|c| c.position + 1)
        .max()
        .unwrap_or(0)
}

#[async_trait]
impl Gateway for MockGateway {
    fn current_user(&self) -> MemberId {
        BOT
    }

    async fn channels_in(&self, category: CategoryId) -> Result<Vec<ChannelInfo>, GatewayError> {
        Ok(self.channels_in_category(category))
    }

    async fn channel_info(&self, channel: ChannelId) -> Result<Option<ChannelInfo>, GatewayError> {
        Ok(self.state.lock().channels.get(&channel).cloned())
    }

    async fn create_channel(
        &self,
        category: CategoryId,
        name: &str,
    ) -> Result<ChannelInfo, GatewayError> {
        let id = self.add_channel(category, name);
        Ok(self
            .state
            .lock()
            .channels
            .get(&id)
            .cloned()
            .expect("Channel just created"))
    }

    async fn move_channel(
        &self,
        channel: ChannelId,
        category: CategoryId,
        position: u32,
        _edits: ChannelEdits,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        let info = state
            .channels
            .get_mut(&channel)
            .ok_or_else(|| GatewayError::NotFound(format!("channel {channel}")))?;
        info.category = Some(category);
        info.position = position;
        Ok(())
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<MessageInfo>, GatewayError> {
        let state = self.state.lock();
        if !state.channels.contains_key(&channel) {
            return Err(GatewayError::NotFound(format!("channel {channel}")));
        }
        let history = state.messages.get(&channel).cloned().unwrap_or_default();
        Ok(history.into_iter().rev().take(limit).collect())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, GatewayError> {
        if !self.state.lock().channels.contains_key(&channel) {
            return Err(GatewayError::NotFound(format!("channel {channel}")));
        }
        Ok(self.push_message(channel, BOT, true, content, Utc::now()).id)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        let history = state
            .messages
            .get_mut(&channel)
            .ok_or_else(|| GatewayError::NotFound(format!("channel {channel}")))?;
        let target = history
            .iter_mut()
            .find(|m| m.id == message)
            .ok_or_else(|| GatewayError::NotFound(format!("message {message}")))?;
        target.content = content.to_string();
        Ok(())
    }

    async fn pin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .pins
            .entry(channel)
            .or_default()
            .insert(message);
        Ok(())
    }

    async fn unpin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), GatewayError> {
        let removed = self
            .state
            .lock()
            .pins
            .get_mut(&channel)
            .is_some_and(|p| p.remove(&message));
        if removed {
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("pin {message}")))
        }
    }

    async fn add_role(&self, member: MemberId, role: RoleId) -> Result<(), GatewayError> {
        self.grant_role(member, role);
        Ok(())
    }

    async fn remove_role(&self, member: MemberId, role: RoleId) -> Result<(), GatewayError> {
        self.state
            .lock()
            .roles
            .entry(member)
            .or_default()
            .remove(&role);
        Ok(())
    }

    async fn member_roles(&self, member: MemberId) -> Result<Vec<RoleId>, GatewayError> {
        Ok(self
            .state
            .lock()
            .roles
            .get(&member)
            .map(|r| r.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn dm_member(&self, member: MemberId, content: &str) -> Result<(), GatewayError> {
        self.state.lock().dms.push((member, content.to_string()));
        Ok(())
    }
}
