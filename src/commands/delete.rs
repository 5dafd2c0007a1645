use super::autocomplete;
use crate::actions;
use crate::{locale, Context, Error};
use poise::CreateReply;
use tracing::info;

/// Delete an agent or a knowledge base
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Agent to delete"]
    #[autocomplete = "autocomplete::agents"]
    agent: Option<String>,
    #[description = "Knowledge base to delete"]
    #[autocomplete = "autocomplete::knowledge_bases"]
    knowledge: Option<String>,
) -> Result<(), Error> {
    info!(
        "Delete requested by {}: agent={:?} knowledge={:?}",
        ctx.author().name,
        agent,
        knowledge
    );
    ctx.defer_ephemeral().await?;

    let reply = actions::settle(
        actions::delete(
            &ctx.data().devana,
            locale(ctx),
            agent.as_deref(),
            knowledge.as_deref(),
        )
        .await,
    )?;

    ctx.send(CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}
