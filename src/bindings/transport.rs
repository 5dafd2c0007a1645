use super::{BindingSet, ConfigMessage, CONFIG_AUTHOR};
use crate::error::BotResult;
use crate::i18n::{t, Locale, Msg};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::{
    ChannelId, ChannelType, CreateEmbed, CreateEmbedAuthor, CreateMessage, EditMessage,
    GetMessages, GuildId, Http, MessageType, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channel kinds whose pins are scanned for the configuration message.
pub fn accepts_configuration(kind: ChannelType) -> bool {
    matches!(kind, ChannelType::Text | ChannelType::News)
}

/// Where configuration messages are read from and written to.
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Every configuration message pinned in the guild.
    async fn scan(&self, guild_id: GuildId) -> BotResult<Vec<ConfigMessage>>;

    /// Posts and pins a new, empty configuration message.
    async fn publish(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        locale: Locale,
    ) -> BotResult<ConfigMessage>;

    /// Re-sends `message` carrying `bindings` as its fields.
    async fn rewrite(&self, message: &ConfigMessage, bindings: &BindingSet)
        -> BotResult<ConfigMessage>;

    async fn delete(&self, message: &ConfigMessage) -> BotResult<()>;
}

pub struct SerenityTransport {
    http: Arc<Http>,
    bot_id: UserId,
    bot_name: String,
}

impl SerenityTransport {
    pub fn new(http: Arc<Http>, bot_id: UserId, bot_name: String) -> Self {
        Self {
            http,
            bot_id,
            bot_name,
        }
    }
}

pub fn render_embed(title: &str, description: &str, bindings: &BindingSet) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .author(CreateEmbedAuthor::new(CONFIG_AUTHOR))
        .fields(
            bindings
                .to_fields()
                .into_iter()
                .map(|(name, value)| (name, value, false)),
        )
}

/// Reads a configuration message back from a Discord message, if it is one.
pub fn parse_config_message(
    guild_id: GuildId,
    bot_id: UserId,
    message: &serenity::Message,
) -> Option<ConfigMessage> {
    if message.author.id != bot_id {
        return None;
    }
    let embed = message.embeds.iter().find(|embed| {
        embed
            .author
            .as_ref()
            .is_some_and(|author| author.name == CONFIG_AUTHOR)
    })?;

    Some(ConfigMessage {
        guild_id,
        channel_id: message.channel_id,
        message_id: message.id,
        title: embed.title.clone().unwrap_or_default(),
        description: embed.description.clone().unwrap_or_default(),
        bindings: BindingSet::from_fields(
            embed
                .fields
                .iter()
                .map(|field| (field.name.as_str(), field.value.as_str())),
        ),
    })
}

#[async_trait]
impl ConfigTransport for SerenityTransport {
    async fn scan(&self, guild_id: GuildId) -> BotResult<Vec<ConfigMessage>> {
        let channels = guild_id.channels(&self.http).await?;
        let text_channels = channels
            .values()
            .filter(|c| accepts_configuration(c.kind))
            .map(|c| c.id)
            .collect::<Vec<_>>();
        debug!(
            "Scanning {} channels of guild {} for configuration",
            text_channels.len(),
            guild_id
        );

        let pins = futures::future::join_all(
            text_channels
                .iter()
                .map(|channel_id| channel_id.pins(&self.http)),
        )
        .await;

        let mut found = Vec::new();
        for (channel_id, result) in text_channels.iter().zip(pins) {
            match result {
                Ok(messages) => found.extend(
                    messages
                        .iter()
                        .filter_map(|m| parse_config_message(guild_id, self.bot_id, m)),
                ),
                // Channels the bot cannot read are skipped.
                Err(e) => debug!("Cannot read pins of channel {}: {}", channel_id, e),
            }
        }
        Ok(found)
    }

    async fn publish(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        locale: Locale,
    ) -> BotResult<ConfigMessage> {
        let title = t(locale, Msg::ConfigTitle, &[]);
        let description = t(locale, Msg::ConfigDescription, &[&self.bot_name]);
        let bindings = BindingSet::default();

        let message = channel_id
            .send_message(
                &self.http,
                CreateMessage::new().embed(render_embed(&title, &description, &bindings)),
            )
            .await?;
        self.http
            .pin_message(
                channel_id,
                message.id,
                Some(&t(locale, Msg::ConfigPinReason, &[])),
            )
            .await?;

        // Drop the "pinned a message" notice that follows.
        match channel_id
            .messages(&self.http, GetMessages::new().after(message.id).limit(5))
            .await
        {
            Ok(after) => {
                for notice in after.iter().filter(|m| m.kind == MessageType::PinsAdd) {
                    if let Err(e) = notice.delete(&self.http).await {
                        warn!("Could not delete pin notice {}: {}", notice.id, e);
                    }
                }
            }
            Err(e) => warn!("Could not fetch pin notice in {}: {}", channel_id, e),
        }

        info!(
            "Published configuration message {} in guild {} channel {}",
            message.id, guild_id, channel_id
        );
        Ok(ConfigMessage {
            guild_id,
            channel_id,
            message_id: message.id,
            title,
            description,
            bindings,
        })
    }

    async fn rewrite(
        &self,
        message: &ConfigMessage,
        bindings: &BindingSet,
    ) -> BotResult<ConfigMessage> {
        let edited = message
            .channel_id
            .edit_message(
                &self.http,
                message.message_id,
                EditMessage::new().embed(render_embed(
                    &message.title,
                    &message.description,
                    bindings,
                )),
            )
            .await?;
        debug!(
            "Rewrote configuration message {} with {} bindings",
            edited.id,
            bindings.len()
        );
        Ok(ConfigMessage {
            bindings: bindings.clone(),
            ..message.clone()
        })
    }

    async fn delete(&self, message: &ConfigMessage) -> BotResult<()> {
        message
            .channel_id
            .delete_message(&self.http, message.message_id)
            .await?;
        info!(
            "Deleted configuration message {} in guild {}",
            message.message_id, message.guild_id
        );
        Ok(())
    }
}
