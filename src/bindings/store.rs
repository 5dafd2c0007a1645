use super::{Binding, ConfigMessage, ConfigTransport};
use crate::cache::ConfigCache;
use crate::error::{BotError, BotResult};
use crate::i18n::Locale;
use poise::serenity_prelude::{ChannelId, GenericId, GuildId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Guild configuration, cached in memory and persisted through a
/// [`ConfigTransport`].
///
/// Writes for one guild are serialized; the cache only changes after the
/// transport accepted the write.
pub struct BindingStore {
    transport: Arc<dyn ConfigTransport>,
    cache: ConfigCache,
    locks: Mutex<HashMap<GuildId, Arc<tokio::sync::Mutex<()>>>>,
}

impl BindingStore {
    pub fn new(transport: Arc<dyn ConfigTransport>, capacity: usize) -> Self {
        Self {
            transport,
            cache: ConfigCache::new(capacity),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn guild_lock(&self, guild_id: GuildId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(guild_id).or_default().clone()
    }

    /// Cached configuration message, scanning the guild on a miss.
    pub async fn resolve_config_message(
        &self,
        guild_id: GuildId,
    ) -> BotResult<Option<ConfigMessage>> {
        if let Some(message) = self.cache.get(guild_id) {
            return Ok(Some(message));
        }
        self.refresh(guild_id).await
    }

    /// Re-reads the guild's configuration from Discord, ignoring the cache.
    pub async fn refresh(&self, guild_id: GuildId) -> BotResult<Option<ConfigMessage>> {
        let mut found = self.transport.scan(guild_id).await?;
        if found.len() > 1 {
            warn!(
                "Guild {} has {} configuration messages, using the newest",
                guild_id,
                found.len()
            );
        }
        found.sort_by_key(|m| m.message_id);
        let Some(newest) = found.pop() else {
            debug!("No configuration message in guild {}", guild_id);
            self.cache.remove(guild_id);
            return Ok(None);
        };

        debug!(
            "Guild {} configuration is message {} ({} bindings)",
            guild_id,
            newest.message_id,
            newest.bindings.len()
        );
        self.cache.insert(newest.clone());
        Ok(Some(newest))
    }

    pub fn record_config_message(&self, message: ConfigMessage) {
        self.cache.insert(message);
    }

    pub fn cached(&self, guild_id: GuildId) -> Option<ConfigMessage> {
        self.cache.get(guild_id)
    }

    /// Binds `channel_id` to `agent_id`.
    pub async fn bind(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        agent_id: &str,
        permission_id: Option<GenericId>,
    ) -> BotResult<ConfigMessage> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let config = self
            .resolve_config_message(guild_id)
            .await?
            .ok_or_else(|| BotError::NoConfig(guild_id.to_string()))?;

        let mut bindings = config.bindings.clone();
        bindings.insert(Binding::new(channel_id, agent_id).with_permission(permission_id))?;

        let written = self.transport.rewrite(&config, &bindings).await?;
        self.record_config_message(written.clone());
        info!(
            "Bound channel {} to agent {} in guild {}",
            channel_id, agent_id, guild_id
        );
        Ok(written)
    }

    pub async fn unbind(&self, guild_id: GuildId, channel_id: ChannelId) -> BotResult<Binding> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let config = self
            .resolve_config_message(guild_id)
            .await?
            .ok_or_else(|| BotError::NoConfig(guild_id.to_string()))?;

        let mut bindings = config.bindings.clone();
        let removed = bindings.remove(channel_id)?;

        let written = self.transport.rewrite(&config, &bindings).await?;
        self.record_config_message(written);
        info!(
            "Unbound channel {} from agent {} in guild {}",
            channel_id, removed.agent_id, guild_id
        );
        Ok(removed)
    }

    /// Binding for a channel, falling back to its parent. Reads the cache
    /// only.
    pub fn resolve_agent(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        parent_id: Option<ChannelId>,
    ) -> Option<Binding> {
        self.cache
            .get(guild_id)
            .and_then(|config| config.bindings.resolve(channel_id, parent_id).cloned())
    }

    /// Replaces the guild's configuration message with a fresh, empty one
    /// posted in `channel_id`.
    pub async fn recreate(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        locale: Locale,
    ) -> BotResult<ConfigMessage> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        if let Some(previous) = self.resolve_config_message(guild_id).await? {
            // A message deleted by hand is already gone.
            if let Err(e) = self.transport.delete(&previous).await {
                warn!(
                    "Could not delete previous configuration message {}: {}",
                    previous.message_id, e
                );
            }
            self.cache.remove(guild_id);
        }

        let message = self.transport.publish(guild_id, channel_id, locale).await?;
        self.record_config_message(message.clone());
        Ok(message)
    }
}
