pub mod actions;
pub mod bindings;
pub mod cache;
pub mod commands;
pub mod config;
pub mod devana;
pub mod discord_text;
pub mod error;
pub mod i18n;
pub mod ingest;
pub mod listener;
pub mod relay;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub devana: Arc<devana::DevanaClient>,
    pub bindings: Arc<bindings::BindingStore>,
    /// Bot's own user ID, for mention handling
    pub bot_id: u64,
    /// Cancelled on shutdown; in-flight answer streams hold child tokens
    pub shutdown: CancellationToken,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type ApplicationContext<'a> = poise::ApplicationContext<'a, Data, Error>;

/// Locale of the user who invoked a command.
pub fn locale(ctx: Context<'_>) -> i18n::Locale {
    ctx.locale().map(i18n::Locale::from_tag).unwrap_or_default()
}
