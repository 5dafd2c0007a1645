//! Routes posted messages to the agent bound to their channel.

use crate::devana::stream::ChatStream;
use crate::discord_text::strip_bot_mentions;
use crate::error::BotResult;
use crate::i18n::{t, Locale, Msg};
use crate::relay::{DiscordSink, RelayOutcome, RelaySink, StreamRelay};
use crate::{Data, Error};
use ::serenity::utils::{content_safe, ContentSafeOptions};
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, ChannelType, GetMessages, GuildId};
use tracing::{debug, error, info};

/// Why the bot answers a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Mention,
    /// First message of a thread, answered without a mention.
    ThreadStart,
}

/// Decides whether a message gets an answer. `thread_messages` is the number
/// of messages found in the thread when looking back two messages.
pub fn trigger_for(
    from_bot: bool,
    mentioned: bool,
    in_thread: bool,
    thread_messages: Option<usize>,
) -> Option<Trigger> {
    if from_bot {
        return None;
    }
    if mentioned {
        return Some(Trigger::Mention);
    }
    match (in_thread, thread_messages) {
        (true, Some(count)) if count <= 1 => Some(Trigger::ThreadStart),
        _ => None,
    }
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

fn guild_locale(ctx: &serenity::Context, guild_id: GuildId) -> Locale {
    ctx.cache
        .guild(guild_id)
        .map(|guild| Locale::from_tag(&guild.preferred_locale))
        .unwrap_or_default()
}

pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let mentioned = msg.mentions_user_id(data.bot_id);
    let channel = msg.channel_id.to_channel(ctx).await?.guild();
    let (in_thread, parent_id) = match &channel {
        Some(c) if is_thread(c.kind) => (true, c.parent_id),
        _ => (false, None),
    };
    if !mentioned && !in_thread {
        return Ok(());
    }

    let thread_messages = if in_thread && !mentioned {
        let recent = msg
            .channel_id
            .messages(&ctx.http, GetMessages::new().limit(2))
            .await?;
        Some(recent.len())
    } else {
        None
    };
    let Some(trigger) = trigger_for(msg.author.bot, mentioned, in_thread, thread_messages) else {
        return Ok(());
    };

    data.bindings.resolve_config_message(guild_id).await?;
    let Some(binding) = data
        .bindings
        .resolve_agent(guild_id, msg.channel_id, parent_id)
    else {
        debug!("No agent bound to channel {}", msg.channel_id);
        return Ok(());
    };

    let role_ids = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect::<Vec<_>>())
        .unwrap_or_default();
    if !binding.permits(msg.author.id.get(), &role_ids) {
        debug!(
            "{} is not allowed to use agent {} in {}",
            msg.author.name, binding.agent_id, msg.channel_id
        );
        return Ok(());
    }

    let raw = strip_bot_mentions(&msg.content, data.bot_id);
    let prompt = content_safe(
        &ctx.cache,
        &raw,
        &ContentSafeOptions::default(),
        &msg.mentions,
    );
    if prompt.trim().is_empty() {
        return Ok(());
    }

    info!(
        "Asking agent {} for {} in channel {} ({:?})",
        binding.agent_id, msg.author.name, msg.channel_id, trigger
    );
    let locale = guild_locale(ctx, guild_id);
    let mut sink = DiscordSink::new(ctx.http.clone(), msg.channel_id, msg.id);
    if trigger == Trigger::ThreadStart {
        sink = sink.with_prefix(t(locale, Msg::ThreadAnnounce, &[]));
    }

    if let Err(e) = msg.channel_id.broadcast_typing(&ctx.http).await {
        debug!("Typing indicator failed in {}: {}", msg.channel_id, e);
    }
    if let Err(e) = answer(data, &binding.agent_id, &prompt, msg.channel_id, &mut sink).await {
        error!("Agent {} failed to answer: {}", binding.agent_id, e);
        msg.reply(ctx, t(locale, Msg::InternalError, &[])).await?;
    }
    Ok(())
}

/// Asks the agent, keeping one backend conversation per channel.
async fn answer<S: RelaySink + ?Sized>(
    data: &Data,
    agent_id: &str,
    prompt: &str,
    channel_id: ChannelId,
    sink: &mut S,
) -> BotResult<()> {
    let chat_id = channel_id.to_string();

    if data.config.stream_replies {
        let stream: ChatStream = data
            .devana
            .ask_stream(agent_id, prompt, Some(&chat_id), &[])
            .await?;
        let relay = StreamRelay::new(data.shutdown.child_token());
        if relay.run(stream, sink).await? == RelayOutcome::Cancelled {
            debug!("Answer in {} cancelled", channel_id);
        }
    } else {
        let response = data
            .devana
            .ask(agent_id, prompt, Some(&chat_id), &[])
            .await?;
        sink.update(&crate::relay::unescape(&response.text), true)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bots_are_never_answered() {
        assert_eq!(trigger_for(true, true, false, None), None);
    }

    #[test]
    fn mention_triggers_anywhere() {
        assert_eq!(trigger_for(false, true, false, None), Some(Trigger::Mention));
        assert_eq!(trigger_for(false, true, true, None), Some(Trigger::Mention));
    }

    #[test]
    fn only_first_thread_message_triggers_without_mention() {
        assert_eq!(trigger_for(false, false, true, Some(1)), Some(Trigger::ThreadStart));
        assert_eq!(trigger_for(false, false, true, Some(2)), None);
        assert_eq!(trigger_for(false, false, false, None), None);
    }

    #[test]
    fn thread_kinds() {
        assert!(is_thread(ChannelType::PublicThread));
        assert!(is_thread(ChannelType::PrivateThread));
        assert!(!is_thread(ChannelType::Text));
        assert!(!is_thread(ChannelType::Forum));
    }
}
