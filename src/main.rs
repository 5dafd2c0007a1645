use devana_bot::bindings::{BindingStore, SerenityTransport};
use devana_bot::devana::DevanaClient;
use devana_bot::error::BotError;
use devana_bot::i18n::{t, Msg};
use devana_bot::{actions, commands, config::Config, listener, Data, Error};
use poise::serenity_prelude as serenity;
use poise::CreateReply;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Gateway events the bot reacts to; everything else is ignored.
async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            listener::handle_message(ctx, new_message, data).await
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if is_new.unwrap_or(false) {
                info!("Joined guild {} ({})", guild.name, guild.id);
                preload_config(data.bindings.clone(), guild.id);
            }
            Ok(())
        }
        serenity::FullEvent::Ratelimit { data: info } => {
            warn!("Rate limited on {}: retry in {:?}", info.path, info.timeout);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn preload_config(bindings: Arc<BindingStore>, guild_id: serenity::GuildId) {
    tokio::spawn(async move {
        if let Err(e) = bindings.resolve_config_message(guild_id).await {
            warn!("Could not load configuration of guild {}: {}", guild_id, e);
        }
    });
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command /{} failed: {}", ctx.command().qualified_name, error);
            let locale = devana_bot::locale(ctx);
            let reply = match error.downcast_ref::<BotError>() {
                Some(e) => actions::error_reply(locale, e),
                None => t(locale, Msg::InternalError, &[]),
            };
            if let Err(e) = ctx
                .send(CreateReply::default().content(reply).ephemeral(true))
                .await
            {
                warn!("Could not report command failure: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Handling {} failed: {}", event.snake_case_name(), error);
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting with {:?}", config);
    let discord_token = config.discord_token.clone();
    let shutdown = CancellationToken::new();
    let data_shutdown = shutdown.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(handle_event(ctx, event, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);

                let devana = Arc::new(DevanaClient::new(&config)?);
                if let Err(e) = devana.login().await {
                    warn!("Devana login failed, retrying on first request: {}", e);
                }

                let transport = Arc::new(SerenityTransport::new(
                    ctx.http.clone(),
                    ready.user.id,
                    ready.user.name.clone(),
                ));
                let bindings = Arc::new(BindingStore::new(transport, config.config_cache_capacity));
                for guild in &ready.guilds {
                    preload_config(bindings.clone(), guild.id);
                }

                if config.register_commands {
                    let commands = &framework.options().commands;
                    match config.dev_guild_id {
                        Some(id) => {
                            poise::builtins::register_in_guild(ctx, commands, serenity::GuildId::new(id))
                                .await?;
                            info!("Registered {} commands in guild {}", commands.len(), id);
                        }
                        None => {
                            poise::builtins::register_globally(ctx, commands).await?;
                            info!("Registered {} commands globally", commands.len());
                        }
                    }
                }

                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                Ok(Data {
                    bot_id: ready.user.id.get(),
                    config,
                    devana,
                    bindings,
                    shutdown: data_shutdown,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shutdown.cancel();
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
