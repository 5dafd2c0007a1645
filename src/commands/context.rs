//! Message context menus that turn chat content into backend entities.
//!
//! "Create knowledge base" ingests a user's message; the confirmation it
//! posts carries a `knowledge-id` field. "Create agent" is run on that
//! confirmation and opens a form to describe the agent.

use crate::actions::error_reply;
use crate::devana::models::{AgentSpec, AgentTraits, KnowledgeBase};
use crate::devana::{prompts, DevanaClient};
use crate::discord_text::extract_message_text;
use crate::error::{BotError, BotResult};
use crate::i18n::{t, Locale, Msg};
use crate::ingest;
use crate::{ApplicationContext, Error};
use poise::serenity_prelude as serenity;
use poise::{CreateReply, Modal};
use serenity::{CreateEmbed, CreateMessage, UserId};
use tracing::{info, warn};

pub const KNOWLEDGE_ID_FIELD: &str = "knowledge-id";
pub const AGENT_ID_FIELD: &str = "agent-id";

/// Name used when the helper agent gives nothing usable.
const FALLBACK_KNOWLEDGE_NAME: &str = "Discord message";

#[derive(Debug, Modal)]
#[name = "Create agent"]
pub struct AgentModal {
    #[name = "Name"]
    #[max_length = 100]
    pub name: String,
    #[name = "Description"]
    #[placeholder = "What the agent does, which model, public or not, web access..."]
    #[paragraph]
    #[max_length = 1000]
    pub description: Option<String>,
    #[name = "Identity"]
    #[placeholder = "How the agent presents itself"]
    #[paragraph]
    #[max_length = 1000]
    pub identity: Option<String>,
}

pub fn knowledge_url(app_url: &str, id: &str) -> String {
    format!("{}/account/knowledge/{}", app_url, id)
}

pub fn agent_url(app_url: &str, id: &str) -> String {
    format!("{}/chat/{}", app_url, id)
}

/// ID of the knowledge base a bot confirmation message describes.
pub fn knowledge_id_of(message: &serenity::Message, bot_id: UserId) -> Option<String> {
    if message.author.id != bot_id {
        return None;
    }
    message
        .embeds
        .iter()
        .flat_map(|embed| embed.fields.iter())
        .find(|field| field.name == KNOWLEDGE_ID_FIELD)
        .map(|field| field.value.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// First line of the helper's answer, without quotes or trailing dots.
fn clean_name(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*' || c == '.')
        .trim()
        .to_string()
}

/// Asks the helper agent for a short name describing `content`.
pub async fn suggest_knowledge_name(
    devana: &DevanaClient,
    helper_agent: &str,
    content: &str,
) -> BotResult<String> {
    if content.trim().is_empty() {
        return Ok(FALLBACK_KNOWLEDGE_NAME.to_string());
    }
    let answer = devana
        .ask(helper_agent, &prompts::knowledge_name(content), None, &[])
        .await?;
    let name = clean_name(&answer.text);
    if name.is_empty() {
        return Ok(FALLBACK_KNOWLEDGE_NAME.to_string());
    }
    Ok(name)
}

/// Builds the agent described by the form, reading model and options out of
/// the free-form description through the helper agent.
pub async fn agent_spec_from_form(
    devana: &DevanaClient,
    helper_agent: &str,
    form: AgentModal,
    knowledge_base_id: String,
) -> BotResult<AgentSpec> {
    let description = form.description.filter(|d| !d.trim().is_empty());
    let identity = form.identity.filter(|i| !i.trim().is_empty());

    let traits = match &description {
        Some(text) => {
            let models = devana.valid_models().await;
            let answer = devana
                .ask(helper_agent, &prompts::agent_traits(&models, text), None, &[])
                .await?;
            AgentTraits::parse(&answer.text)
        }
        None => AgentTraits::default(),
    };

    Ok(traits.into_spec(form.name.trim().to_string(), description, identity, knowledge_base_id))
}

fn knowledge_embed(locale: Locale, app_url: &str, kb: &KnowledgeBase) -> CreateEmbed {
    CreateEmbed::new()
        .title(t(locale, Msg::KnowledgeCreatedTitle, &[]))
        .description(t(locale, Msg::KnowledgeCreatedDescription, &[&kb.name]))
        .url(knowledge_url(app_url, &kb.id))
        .field(KNOWLEDGE_ID_FIELD, &kb.id, false)
        .color(0x5865F2)
}

fn agent_embed(locale: Locale, app_url: &str, id: &str, name: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(t(locale, Msg::AgentCreatedTitle, &[]))
        .description(t(locale, Msg::AgentCreatedDescription, &[name]))
        .url(agent_url(app_url, id))
        .field(AGENT_ID_FIELD, id, false)
        .color(0x57F287)
}

fn ephemeral(content: String) -> CreateReply {
    CreateReply::default().content(content).ephemeral(true)
}

/// Create a knowledge base from this message
#[poise::command(
    context_menu_command = "Create knowledge base",
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn create_knowledge_base(
    ctx: ApplicationContext<'_>,
    message: serenity::Message,
) -> Result<(), Error> {
    let locale = Locale::from_tag(&ctx.interaction.locale);
    let ctx = poise::Context::Application(ctx);
    let data = ctx.data();

    if message.author.bot {
        ctx.send(ephemeral(t(locale, Msg::KnowledgeOwnMessageError, &[])))
            .await?;
        return Ok(());
    }
    info!(
        "Knowledge base requested by {} from message {}",
        ctx.author().name,
        message.id
    );
    let loading = ctx
        .send(ephemeral(t(locale, Msg::KnowledgeLoading, &[])))
        .await?;

    let content = extract_message_text(&message);
    let name =
        suggest_knowledge_name(&data.devana, &data.config.devana_agent_base, &content).await?;
    let attachments = message
        .attachments
        .iter()
        .map(|a| (a.url.clone(), a.filename.clone()))
        .collect::<Vec<_>>();

    let report =
        ingest::create_knowledge_base(&data.devana, &name, &content, &attachments).await?;

    message
        .channel_id
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .embed(knowledge_embed(
                    locale,
                    &data.config.devana_app_url,
                    &report.knowledge_base,
                ))
                .reference_message(&message),
        )
        .await?;

    let status = if report.is_complete() {
        t(
            locale,
            Msg::KnowledgeCreatedDescription,
            &[&report.knowledge_base.name],
        )
    } else {
        warn!(
            "Knowledge base {} created with failed steps: {}",
            report.knowledge_base.id,
            report.failed_steps()
        );
        t(locale, Msg::KnowledgePartial, &[&report.failed_steps()])
    };
    loading.edit(ctx, ephemeral(status)).await?;
    Ok(())
}

/// Create an agent from a knowledge base confirmation
#[poise::command(
    context_menu_command = "Create agent",
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn create_agent(
    app_ctx: ApplicationContext<'_>,
    message: serenity::Message,
) -> Result<(), Error> {
    let locale = Locale::from_tag(&app_ctx.interaction.locale);
    let ctx = poise::Context::Application(app_ctx);
    let data = ctx.data();

    let Some(knowledge_base_id) = knowledge_id_of(&message, UserId::new(data.bot_id)) else {
        ctx.send(ephemeral(t(locale, Msg::AgentOwnMessageError, &[])))
            .await?;
        return Ok(());
    };
    let Some(kb) = data.devana.get_knowledge_base(&knowledge_base_id).await? else {
        ctx.send(ephemeral(t(locale, Msg::AgentKnowledgeNotFound, &[])))
            .await?;
        return Ok(());
    };

    let defaults = AgentModal {
        name: kb.name.clone(),
        description: None,
        identity: None,
    };
    let Some(form) = AgentModal::execute_with_defaults(app_ctx, defaults).await? else {
        return Ok(());
    };
    info!(
        "Agent {:?} requested by {} on knowledge base {}",
        form.name,
        ctx.author().name,
        kb.id
    );
    let loading = ctx.send(ephemeral(t(locale, Msg::AgentLoading, &[]))).await?;

    let spec =
        agent_spec_from_form(&data.devana, &data.config.devana_agent_base, form, kb.id).await?;
    let agent = match data.devana.create_agent(&spec).await {
        Ok(agent) => agent,
        Err(e @ BotError::InvalidModel(_)) => {
            loading.edit(ctx, ephemeral(error_reply(locale, &e))).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    message
        .channel_id
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .embed(agent_embed(
                    locale,
                    &data.config.devana_app_url,
                    &agent.id,
                    &agent.name,
                ))
                .reference_message(&message),
        )
        .await?;
    loading
        .edit(
            ctx,
            ephemeral(t(locale, Msg::AgentCreatedDescription, &[&agent.name])),
        )
        .await?;
    Ok(())
}
