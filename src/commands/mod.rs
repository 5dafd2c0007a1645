pub mod autocomplete;
pub mod configuration;
pub mod context;
pub mod delete;
pub mod link;

use crate::{Data, Error};

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        configuration::configuration(),
        link::link(),
        link::unlink(),
        delete::delete(),
        context::create_knowledge_base(),
        context::create_agent(),
    ]
}
