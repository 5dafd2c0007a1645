//! Channel → agent bindings.
//!
//! A guild's bindings live in the embed fields of one pinned, bot-authored
//! "configuration message": `name = channel id`, `value = agent id`, plus an
//! optional `"{channel id}-permission"` field naming the user or role allowed
//! to talk to that channel's agent.

pub mod store;
pub mod transport;

pub use store::BindingStore;
pub use transport::{accepts_configuration, ConfigTransport, SerenityTransport};

use crate::error::{BotError, BotResult};
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, GenericId, GuildId, MessageId};
use std::collections::HashMap;
use tracing::warn;

/// Embed author name marking a configuration message.
pub const CONFIG_AUTHOR: &str = "Devana configuration";
pub const PERMISSION_SUFFIX: &str = "-permission";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub channel_id: ChannelId,
    pub agent_id: String,
    /// User or role allowed to use the agent; everyone when absent
    pub permission_id: Option<GenericId>,
}

impl Binding {
    pub fn new(channel_id: ChannelId, agent_id: impl Into<String>) -> Self {
        Self {
            channel_id,
            agent_id: agent_id.into(),
            permission_id: None,
        }
    }

    pub fn with_permission(mut self, permission_id: Option<GenericId>) -> Self {
        self.permission_id = permission_id;
        self
    }

    /// Whether a user holding `role_ids` may use this binding.
    pub fn permits(&self, user_id: u64, role_ids: &[u64]) -> bool {
        match self.permission_id {
            None => true,
            Some(id) => id.get() == user_id || role_ids.contains(&id.get()),
        }
    }
}

/// The bindings of one guild; channel IDs are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: Vec<Binding>,
}

impl BindingSet {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn get(&self, channel_id: ChannelId) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.channel_id == channel_id)
    }

    pub fn insert(&mut self, binding: Binding) -> BotResult<()> {
        if self.get(binding.channel_id).is_some() {
            return Err(BotError::AlreadyBound(binding.channel_id.to_string()));
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn remove(&mut self, channel_id: ChannelId) -> BotResult<Binding> {
        let pos = self
            .bindings
            .iter()
            .position(|b| b.channel_id == channel_id)
            .ok_or_else(|| BotError::NotBound(channel_id.to_string()))?;
        Ok(self.bindings.remove(pos))
    }

    /// Binding for `channel_id`, else for its parent. A binding on a thread
    /// never applies to the parent channel.
    pub fn resolve(&self, channel_id: ChannelId, parent_id: Option<ChannelId>) -> Option<&Binding> {
        self.get(channel_id)
            .or_else(|| parent_id.and_then(|parent| self.get(parent)))
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            fields.push((binding.channel_id.to_string(), binding.agent_id.clone()));
            if let Some(permission) = binding.permission_id {
                fields.push((
                    format!("{}{}", binding.channel_id, PERMISSION_SUFFIX),
                    permission.to_string(),
                ));
            }
        }
        fields
    }

    /// Parses embed fields; fields that are not bindings are ignored.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut set = BindingSet::default();
        let mut permissions: HashMap<ChannelId, GenericId> = HashMap::new();

        for (name, value) in fields {
            let (name, value) = (name.trim(), value.trim());
            if let Some(channel) = name.strip_suffix(PERMISSION_SUFFIX) {
                if let (Some(channel), Some(permission)) = (parse_id(channel), parse_id(value)) {
                    permissions.insert(ChannelId::new(channel), GenericId::new(permission));
                }
                continue;
            }
            let Some(channel) = parse_id(name) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if set.insert(Binding::new(ChannelId::new(channel), value)).is_err() {
                warn!("Configuration lists channel {} twice, keeping the first", channel);
            }
        }

        for binding in &mut set.bindings {
            binding.permission_id = permissions.remove(&binding.channel_id);
        }
        set
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

/// A guild's configuration message, as last read from or written to Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub title: String,
    pub description: String,
    pub bindings: BindingSet,
}
