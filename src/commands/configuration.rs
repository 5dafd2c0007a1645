use crate::actions;
use crate::{locale, Context, Error};
use poise::CreateReply;
use tracing::info;

/// Create (or recreate) the configuration message in this channel
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn configuration(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    info!("Configuration requested by {} in guild {}", ctx.author().name, guild_id);
    ctx.defer_ephemeral().await?;

    let channel_kind = ctx
        .channel_id()
        .to_channel(ctx.serenity_context())
        .await?
        .guild()
        .map(|c| c.kind);
    let reply = actions::settle(
        actions::create_configuration(
            &ctx.data().bindings,
            locale(ctx),
            guild_id,
            ctx.channel_id(),
            channel_kind,
        )
        .await,
    )?;

    ctx.send(CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}
