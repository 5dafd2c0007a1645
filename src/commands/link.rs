use super::autocomplete;
use crate::actions;
use crate::{locale, Context, Error};
use poise::serenity_prelude as serenity;
use poise::{CreateReply, SlashArgError};
use serenity::{GenericId, GuildChannel, ResolvedValue};
use tracing::info;

/// A user or role picked through a mentionable option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionTarget(pub GenericId);

#[async_trait::async_trait]
impl poise::SlashArgument for PermissionTarget {
    async fn extract(
        _ctx: &serenity::Context,
        _interaction: &serenity::CommandInteraction,
        value: &ResolvedValue<'_>,
    ) -> Result<Self, SlashArgError> {
        let id = match value {
            ResolvedValue::User(user, _) => user.id.get(),
            ResolvedValue::Role(role) => role.id.get(),
            _ => {
                return Err(SlashArgError::new_command_structure_mismatch(
                    "expected a user or a role",
                ))
            }
        };
        Ok(Self(GenericId::new(id)))
    }

    fn create(builder: serenity::CreateCommandOption) -> serenity::CreateCommandOption {
        builder.kind(serenity::CommandOptionType::Mentionable)
    }
}

/// Link a channel to an agent
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn link(
    ctx: Context<'_>,
    #[description = "Channel the agent will answer in"]
    #[channel_types("Text", "Forum")]
    channel: Option<GuildChannel>,
    #[description = "Agent to link"]
    #[autocomplete = "autocomplete::agents"]
    agent: Option<String>,
    #[description = "Only this user or role may talk to the agent"]
    permission: Option<PermissionTarget>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    info!(
        "Link requested by {} in guild {}: channel={:?} agent={:?}",
        ctx.author().name,
        guild_id,
        channel.as_ref().map(|c| c.id),
        agent
    );
    ctx.defer_ephemeral().await?;

    let reply = actions::settle(
        actions::link(
            &ctx.data().bindings,
            &ctx.data().devana,
            locale(ctx),
            guild_id,
            channel.map(|c| c.id),
            agent.as_deref(),
            permission.map(|p| p.0),
        )
        .await,
    )?;

    ctx.send(CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Unlink a channel from its agent
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn unlink(
    ctx: Context<'_>,
    #[description = "Channel to unlink"]
    #[channel_types("Text", "Forum")]
    channel: Option<GuildChannel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    info!(
        "Unlink requested by {} in guild {}: channel={:?}",
        ctx.author().name,
        guild_id,
        channel.as_ref().map(|c| c.id)
    );
    ctx.defer_ephemeral().await?;

    let reply = actions::settle(
        actions::unlink(
            &ctx.data().bindings,
            locale(ctx),
            guild_id,
            channel.map(|c| c.id),
        )
        .await,
    )?;

    ctx.send(CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}
