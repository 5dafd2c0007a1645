//! Decision logic behind the slash commands.
//!
//! Each action checks, in order, argument presence, configuration existence,
//! referenced entity existence and finally the business rule, stopping at
//! the first failure. Missing or conflicting arguments fail with
//! [`BotError::Validation`] and unknown entities with [`BotError::NotFound`],
//! both carrying the localized reply; [`settle`] turns them into that reply.

use crate::bindings::{accepts_configuration, BindingStore};
use crate::devana::DevanaClient;
use crate::error::{BotError, BotResult};
use crate::i18n::{t, Locale, Msg};
use poise::serenity_prelude::{ChannelId, ChannelType, GenericId, GuildId, Mentionable};
use tracing::info;

/// Localized reply for an error that reached the user.
pub fn error_reply(locale: Locale, err: &BotError) -> String {
    match err {
        BotError::InvalidModel(model) => t(locale, Msg::InvalidModel, &[model]),
        BotError::Fetch { reason, .. } => t(locale, Msg::FetchError, &[reason]),
        BotError::Validation(reply) | BotError::NotFound(reply) => reply.clone(),
        _ => t(locale, Msg::InternalError, &[]),
    }
}

/// Turns validation and lookup failures into their reply; other errors pass through.
pub fn settle(result: BotResult<String>) -> BotResult<String> {
    match result {
        Err(BotError::Validation(reply)) | Err(BotError::NotFound(reply)) => Ok(reply),
        other => other,
    }
}

fn invalid(locale: Locale, msg: Msg, args: &[&str]) -> BotError {
    BotError::Validation(t(locale, msg, args))
}

fn not_found(locale: Locale, msg: Msg, args: &[&str]) -> BotError {
    BotError::NotFound(t(locale, msg, args))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Replaces the guild's configuration message with a new one in `channel_id`.
///
/// Only text and announcement channels are accepted, since those are the
/// only ones scanned when the configuration is looked up again.
pub async fn create_configuration(
    store: &BindingStore,
    locale: Locale,
    guild_id: GuildId,
    channel_id: ChannelId,
    channel_kind: Option<ChannelType>,
) -> BotResult<String> {
    if !channel_kind.is_some_and(accepts_configuration) {
        return Err(invalid(locale, Msg::ConfigWrongChannel, &[]));
    }
    let message = store.recreate(guild_id, channel_id, locale).await?;
    info!(
        "Configuration message {} created in guild {}",
        message.message_id, guild_id
    );
    Ok(t(locale, Msg::ConfigCreated, &[]))
}

pub async fn link(
    store: &BindingStore,
    devana: &DevanaClient,
    locale: Locale,
    guild_id: GuildId,
    channel: Option<ChannelId>,
    agent_name: Option<&str>,
    permission: Option<GenericId>,
) -> BotResult<String> {
    let Some(channel) = channel else {
        return Err(invalid(locale, Msg::LinkMissingChannel, &[]));
    };
    let Some(agent_name) = present(agent_name) else {
        return Err(invalid(locale, Msg::LinkMissingAgent, &[]));
    };
    let mention = channel.mention().to_string();

    let Some(config) = store.resolve_config_message(guild_id).await? else {
        return Err(not_found(locale, Msg::LinkMissingConfig, &[]));
    };

    let Some(agent) = devana.find_agent_by_name(agent_name).await? else {
        return Err(not_found(locale, Msg::LinkAgentNotFound, &[agent_name]));
    };

    if config.bindings.get(channel).is_some() {
        return Ok(t(locale, Msg::LinkAlreadyLinked, &[&mention]));
    }

    match store.bind(guild_id, channel, &agent.id, permission).await {
        Ok(_) => Ok(t(locale, Msg::Linked, &[&mention, &agent.name])),
        Err(BotError::AlreadyBound(_)) => Ok(t(locale, Msg::LinkAlreadyLinked, &[&mention])),
        Err(BotError::NoConfig(_)) => Err(not_found(locale, Msg::LinkMissingConfig, &[])),
        Err(e) => Err(e),
    }
}

pub async fn unlink(
    store: &BindingStore,
    locale: Locale,
    guild_id: GuildId,
    channel: Option<ChannelId>,
) -> BotResult<String> {
    let Some(channel) = channel else {
        return Err(invalid(locale, Msg::UnlinkMissingChannel, &[]));
    };
    let mention = channel.mention().to_string();

    let Some(config) = store.resolve_config_message(guild_id).await? else {
        return Err(not_found(locale, Msg::UnlinkMissingConfig, &[]));
    };
    if config.bindings.get(channel).is_none() {
        return Ok(t(locale, Msg::UnlinkNotLinked, &[&mention]));
    }

    match store.unbind(guild_id, channel).await {
        Ok(_) => Ok(t(locale, Msg::Unlinked, &[&mention])),
        Err(BotError::NotBound(_)) => Ok(t(locale, Msg::UnlinkNotLinked, &[&mention])),
        Err(BotError::NoConfig(_)) => Err(not_found(locale, Msg::UnlinkMissingConfig, &[])),
        Err(e) => Err(e),
    }
}

/// Deletes exactly one agent or knowledge base, looked up by name.
pub async fn delete(
    devana: &DevanaClient,
    locale: Locale,
    agent_name: Option<&str>,
    knowledge_name: Option<&str>,
) -> BotResult<String> {
    let agent_name = present(agent_name);
    let knowledge_name = present(knowledge_name);
    if agent_name.is_none() && knowledge_name.is_none() {
        return Err(invalid(locale, Msg::DeleteMissingTarget, &[]));
    }

    let agent = match agent_name {
        Some(name) => match devana.find_agent_by_name(name).await? {
            Some(agent) => Some(agent),
            None => return Err(not_found(locale, Msg::DeleteAgentNotFound, &[name])),
        },
        None => None,
    };
    let knowledge = match knowledge_name {
        Some(name) => match devana.find_knowledge_base_by_name(name).await? {
            Some(kb) => Some(kb),
            None => return Err(not_found(locale, Msg::DeleteKnowledgeNotFound, &[name])),
        },
        None => None,
    };

    match (agent, knowledge) {
        (Some(agent), None) => {
            devana.delete_agent(&agent.id).await?;
            Ok(t(locale, Msg::AgentDeleted, &[&agent.name]))
        }
        (None, Some(kb)) => {
            devana.delete_knowledge_base(&kb.id).await?;
            Ok(t(locale, Msg::KnowledgeDeleted, &[&kb.name]))
        }
        _ => Err(invalid(locale, Msg::DeleteBothTargets, &[])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::testing::MemoryTransport;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    fn guild() -> GuildId {
        GuildId::new(42)
    }

    fn general() -> ChannelId {
        ChannelId::new(1001)
    }

    fn text() -> Option<ChannelType> {
        Some(ChannelType::Text)
    }

    async fn backend() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "Login" })))
            .with_status(200)
            .with_body(json!({ "data": { "login": "tok" } }).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "getAllMyIAs" })))
            .with_status(200)
            .with_body(
                json!({ "data": { "getAllMyIAs": { "edges": [
                    { "id": "agent-1", "name": "Support Bot" }
                ] } } })
                .to_string(),
            )
            .create_async()
            .await;
        server
    }

    fn devana(server: &mockito::ServerGuard) -> DevanaClient {
        DevanaClient::with_http(
            reqwest::Client::new(),
            &server.url(),
            "bot@example.com".into(),
            "secret".into(),
        )
    }

    fn store() -> (Arc<MemoryTransport>, BindingStore) {
        let transport = Arc::new(MemoryTransport::default());
        (transport.clone(), BindingStore::new(transport, 16))
    }

    #[tokio::test]
    async fn link_scenario_end_to_end() {
        let server = backend().await;
        let devana = devana(&server);
        let (transport, store) = store();
        let en = Locale::En;

        let err = link(&store, &devana, en, guild(), Some(general()), Some("Support Bot"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::NotFound(_)));
        assert!(error_reply(en, &err).contains("You must create a configuration message first"));
        assert!(transport.stored(guild()).is_none());

        let reply = create_configuration(&store, en, guild(), ChannelId::new(7), text())
            .await
            .unwrap();
        assert_eq!(reply, t(en, Msg::ConfigCreated, &[]));

        let reply = link(&store, &devana, en, guild(), Some(general()), Some("Support Bot"), None)
            .await
            .unwrap();
        assert!(reply.contains("<#1001>"));
        assert!(reply.contains("Support Bot"));
        assert_eq!(
            store.resolve_agent(guild(), general(), None).unwrap().agent_id,
            "agent-1"
        );

        let reply = link(&store, &devana, en, guild(), Some(general()), Some("Support Bot"), None)
            .await
            .unwrap();
        assert!(reply.contains("already linked"));
        assert_eq!(transport.stored(guild()).unwrap().bindings.len(), 1);
    }

    #[tokio::test]
    async fn link_checks_arguments_before_anything_else() {
        let server = mockito::Server::new_async().await;
        let devana = devana(&server);
        let (transport, store) = store();

        let err = link(&store, &devana, Locale::En, guild(), None, Some("x"), None)
            .await
            .unwrap_err();
        match err {
            BotError::Validation(reply) => {
                assert_eq!(reply, t(Locale::En, Msg::LinkMissingChannel, &[]))
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let reply = settle(
            link(&store, &devana, Locale::En, guild(), Some(general()), Some("  "), None).await,
        )
        .unwrap();
        assert_eq!(reply, t(Locale::En, Msg::LinkMissingAgent, &[]));
        assert_eq!(transport.scans.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn link_unknown_agent_changes_nothing() {
        let server = backend().await;
        let devana = devana(&server);
        let (transport, store) = store();
        create_configuration(&store, Locale::Fr, guild(), ChannelId::new(7), text())
            .await
            .unwrap();

        let reply = settle(
            link(&store, &devana, Locale::Fr, guild(), Some(general()), Some("Nobody"), None).await,
        )
        .unwrap();
        assert_eq!(reply, t(Locale::Fr, Msg::LinkAgentNotFound, &["Nobody"]));
        assert!(transport.stored(guild()).unwrap().bindings.is_empty());
    }

    #[tokio::test]
    async fn unlink_flow() {
        let server = backend().await;
        let devana = devana(&server);
        let (_, store) = store();

        let reply = settle(unlink(&store, Locale::En, guild(), Some(general())).await).unwrap();
        assert_eq!(reply, t(Locale::En, Msg::UnlinkMissingConfig, &[]));

        create_configuration(&store, Locale::En, guild(), ChannelId::new(7), text())
            .await
            .unwrap();
        let reply = unlink(&store, Locale::En, guild(), Some(general())).await.unwrap();
        assert_eq!(reply, t(Locale::En, Msg::UnlinkNotLinked, &["<#1001>"]));

        link(&store, &devana, Locale::En, guild(), Some(general()), Some("Support Bot"), None)
            .await
            .unwrap();
        let reply = unlink(&store, Locale::En, guild(), Some(general())).await.unwrap();
        assert_eq!(reply, t(Locale::En, Msg::Unlinked, &["<#1001>"]));
        assert!(store.resolve_agent(guild(), general(), None).is_none());
    }

    #[tokio::test]
    async fn delete_validations() {
        let server = backend().await;
        let devana = devana(&server);

        let err = delete(&devana, Locale::En, None, Some("")).await.unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));
        assert_eq!(error_reply(Locale::En, &err), t(Locale::En, Msg::DeleteMissingTarget, &[]));

        let err = delete(&devana, Locale::En, Some("Ghost"), None).await.unwrap_err();
        assert!(matches!(err, BotError::NotFound(_)));
        assert_eq!(
            error_reply(Locale::En, &err),
            t(Locale::En, Msg::DeleteAgentNotFound, &["Ghost"])
        );
    }

    #[tokio::test]
    async fn delete_agent_by_name() {
        let mut server = backend().await;
        let deleted = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "operationName": "DeleteMyIAs",
                "variables": { "id": "agent-1" }
            })))
            .with_status(200)
            .with_body(json!({ "data": { "deleteMyIAs": true } }).to_string())
            .create_async()
            .await;
        let devana = devana(&server);

        let reply = delete(&devana, Locale::En, Some("Support Bot"), None)
            .await
            .unwrap();
        assert_eq!(reply, t(Locale::En, Msg::AgentDeleted, &["Support Bot"]));
        deleted.assert_async().await;
    }

    #[tokio::test]
    async fn delete_rejects_both_targets() {
        let mut server = backend().await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "GetAllFoldersPagination" })))
            .with_status(200)
            .with_body(
                json!({ "data": { "getFoldersPagination": { "edges": [
                    { "id": "kb-1", "name": "Docs" }
                ] } } })
                .to_string(),
            )
            .create_async()
            .await;
        let devana = devana(&server);

        let reply = settle(delete(&devana, Locale::En, Some("Support Bot"), Some("Docs")).await)
            .unwrap();
        assert_eq!(reply, t(Locale::En, Msg::DeleteBothTargets, &[]));
    }

    #[test]
    fn error_replies_are_localized() {
        let reply = error_reply(Locale::En, &BotError::InvalidModel("GPT9".into()));
        assert!(reply.contains("GPT9"));
        let reply = error_reply(Locale::Fr, &BotError::NotBound("1001".into()));
        assert_eq!(reply, t(Locale::Fr, Msg::InternalError, &[]));
    }

    #[test]
    fn settle_keeps_backend_failures() {
        let reply = settle(Err(BotError::Validation("missing".into()))).unwrap();
        assert_eq!(reply, "missing");
        let err = settle(Err(BotError::InvalidModel("GPT9".into()))).unwrap_err();
        assert!(matches!(err, BotError::InvalidModel(_)));
    }

    #[tokio::test]
    async fn configuration_only_goes_to_scanned_channels() {
        let (transport, store) = store();
        for kind in [None, Some(ChannelType::PublicThread), Some(ChannelType::Voice)] {
            let err = create_configuration(&store, Locale::En, guild(), ChannelId::new(7), kind)
                .await
                .unwrap_err();
            assert_eq!(
                error_reply(Locale::En, &err),
                t(Locale::En, Msg::ConfigWrongChannel, &[])
            );
        }
        assert!(transport.stored(guild()).is_none());

        create_configuration(&store, Locale::En, guild(), ChannelId::new(7), Some(ChannelType::News))
            .await
            .unwrap();
        assert!(transport.stored(guild()).is_some());
    }
}
