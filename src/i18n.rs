//! User-facing strings in English and French.
//!
//! Templates use `%name%` placeholders, filled positionally by [`t`].

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    /// Maps a Discord locale tag (`fr`, `en-US`, ...) to a supported locale.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("fr") || tag.to_ascii_lowercase().starts_with("fr-") {
            Locale::Fr
        } else {
            Locale::En
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    InternalError,
    FetchError,
    InvalidModel,

    LinkMissingChannel,
    LinkMissingAgent,
    LinkMissingConfig,
    LinkAgentNotFound,
    LinkAlreadyLinked,
    Linked,

    UnlinkMissingChannel,
    UnlinkMissingConfig,
    UnlinkNotLinked,
    Unlinked,

    DeleteMissingTarget,
    DeleteBothTargets,
    DeleteAgentNotFound,
    AgentDeleted,
    DeleteKnowledgeNotFound,
    KnowledgeDeleted,

    ConfigTitle,
    ConfigDescription,
    ConfigPinReason,
    ConfigCreated,
    ConfigWrongChannel,

    AgentOwnMessageError,
    AgentLoading,
    AgentKnowledgeNotFound,
    AgentCreatedTitle,
    AgentCreatedDescription,

    KnowledgeOwnMessageError,
    KnowledgeLoading,
    KnowledgeCreatedTitle,
    KnowledgeCreatedDescription,
    KnowledgePartial,

    ThreadAnnounce,
}

fn template(locale: Locale, msg: Msg) -> &'static str {
    use Msg::*;
    match locale {
        Locale::En => match msg {
            InternalError => "❌ Something went wrong, please try again later.",
            FetchError => "❌ Could not download an attachment: %reason%",
            InvalidModel => "❌ Invalid model provided: %model%",

            LinkMissingChannel => "❌ You must provide a channel to link.",
            LinkMissingAgent => "❌ You must provide an agent to link.",
            LinkMissingConfig => "❌ You must create a configuration message first (`/configuration`).",
            LinkAgentNotFound => "❌ Agent **%agent%** not found.",
            LinkAlreadyLinked => "❌ %channel% is already linked to an agent.",
            Linked => "✅ %channel% is now linked to **%agent%**.",

            UnlinkMissingChannel => "❌ You must provide a channel to unlink.",
            UnlinkMissingConfig => "❌ You must create a configuration message first (`/configuration`).",
            UnlinkNotLinked => "❌ %channel% is not linked to any agent.",
            Unlinked => "✅ %channel% is no longer linked.",

            DeleteMissingTarget => "❌ You must provide a knowledge base or an agent to delete.",
            DeleteBothTargets => "❌ Provide either a knowledge base or an agent, not both.",
            DeleteAgentNotFound => "❌ Agent **%agent%** not found.",
            AgentDeleted => "🗑️ Agent **%agent%** deleted.",
            DeleteKnowledgeNotFound => "❌ Knowledge base **%knowledge%** not found.",
            KnowledgeDeleted => "🗑️ Knowledge base **%knowledge%** deleted.",

            ConfigTitle => "Do not delete.",
            ConfigDescription => "This is the configuration message the %bot% bot will use.\nEdit it with `/link` and `/unlink`.",
            ConfigPinReason => "Pin is mandatory to find configuration later.",
            ConfigCreated => "✅ Configuration message created!",
            ConfigWrongChannel => "❌ The configuration message can only be created in a text or announcement channel.",

            AgentOwnMessageError => "❌ Use this on a knowledge base message posted by the bot.",
            AgentLoading => "⏳ Creating the agent, this can take a while...",
            AgentKnowledgeNotFound => "❌ This knowledge base no longer exists.",
            AgentCreatedTitle => "Agent created",
            AgentCreatedDescription => "The agent **%name%** has been created.",

            KnowledgeOwnMessageError => "❌ You cannot create a knowledge base from a bot message.",
            KnowledgeLoading => "⏳ Creating the knowledge base, this can take a while...",
            KnowledgeCreatedTitle => "Knowledge base created",
            KnowledgeCreatedDescription => "The knowledge base **%name%** has been created.",
            KnowledgePartial => "⚠️ Some sources could not be added: %steps%",

            ThreadAnnounce => "*This message is auto-generated after the creation of this thread and will try to answer your question. To talk to the agent, mention it in your message.*",
        },
        Locale::Fr => match msg {
            InternalError => "❌ Une erreur est survenue, veuillez réessayer plus tard.",
            FetchError => "❌ Impossible de télécharger une pièce jointe : %reason%",
            InvalidModel => "❌ Modèle invalide : %model%",

            LinkMissingChannel => "❌ Vous devez indiquer un salon à lier.",
            LinkMissingAgent => "❌ Vous devez indiquer un agent à lier.",
            LinkMissingConfig => "❌ Vous devez d'abord créer un message de configuration (`/configuration`).",
            LinkAgentNotFound => "❌ Agent **%agent%** introuvable.",
            LinkAlreadyLinked => "❌ %channel% est déjà lié à un agent.",
            Linked => "✅ %channel% est maintenant lié à **%agent%**.",

            UnlinkMissingChannel => "❌ Vous devez indiquer un salon à délier.",
            UnlinkMissingConfig => "❌ Vous devez d'abord créer un message de configuration (`/configuration`).",
            UnlinkNotLinked => "❌ %channel% n'est lié à aucun agent.",
            Unlinked => "✅ %channel% n'est plus lié.",

            DeleteMissingTarget => "❌ Vous devez indiquer une base de connaissances ou un agent à supprimer.",
            DeleteBothTargets => "❌ Indiquez soit une base de connaissances, soit un agent, pas les deux.",
            DeleteAgentNotFound => "❌ Agent **%agent%** introuvable.",
            AgentDeleted => "🗑️ Agent **%agent%** supprimé.",
            DeleteKnowledgeNotFound => "❌ Base de connaissances **%knowledge%** introuvable.",
            KnowledgeDeleted => "🗑️ Base de connaissances **%knowledge%** supprimée.",

            ConfigTitle => "Ne pas supprimer.",
            ConfigDescription => "Ceci est le message de configuration utilisé par le bot %bot%.\nModifiez-le avec `/link` et `/unlink`.",
            ConfigPinReason => "L'épinglage est nécessaire pour retrouver la configuration.",
            ConfigCreated => "✅ Message de configuration créé !",
            ConfigWrongChannel => "❌ Le message de configuration ne peut être créé que dans un salon textuel ou d'annonces.",

            AgentOwnMessageError => "❌ Utilisez cette action sur un message de base de connaissances publié par le bot.",
            AgentLoading => "⏳ Création de l'agent, cela peut prendre un moment...",
            AgentKnowledgeNotFound => "❌ Cette base de connaissances n'existe plus.",
            AgentCreatedTitle => "Agent créé",
            AgentCreatedDescription => "L'agent **%name%** a été créé.",

            KnowledgeOwnMessageError => "❌ Impossible de créer une base de connaissances depuis un message du bot.",
            KnowledgeLoading => "⏳ Création de la base de connaissances, cela peut prendre un moment...",
            KnowledgeCreatedTitle => "Base de connaissances créée",
            KnowledgeCreatedDescription => "La base de connaissances **%name%** a été créée.",
            KnowledgePartial => "⚠️ Certaines sources n'ont pas pu être ajoutées : %steps%",

            ThreadAnnounce => "*Ce message est auto généré après la création de ce thread et tentera de répondre au mieux à votre question. Si vous souhaitez parler à un agent, mentionnez le dans votre message.*",
        },
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%([a-z_]+)%").expect("placeholder regex is valid"));

/// Fill `%placeholders%` from `args` in order of appearance. Placeholders
/// without a matching argument keep their name.
pub fn fill(text: &str, args: &[&str]) -> String {
    let mut args = args.iter();
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| match args.next() {
            Some(value) => (*value).to_string(),
            None => caps[1].to_string(),
        })
        .into_owned()
}

pub fn t(locale: Locale, msg: Msg, args: &[&str]) -> String {
    fill(template(locale, msg), args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders_in_order() {
        let text = t(Locale::En, Msg::Linked, &["<#42>", "Support Bot"]);
        assert_eq!(text, "✅ <#42> is now linked to **Support Bot**.");
    }

    #[test]
    fn missing_argument_keeps_placeholder_name() {
        assert_eq!(fill("hello %who%", &[]), "hello who");
    }

    #[test]
    fn locale_tags() {
        assert_eq!(Locale::from_tag("fr"), Locale::Fr);
        assert_eq!(Locale::from_tag("fr-FR"), Locale::Fr);
        assert_eq!(Locale::from_tag("en-US"), Locale::En);
        assert_eq!(Locale::from_tag("de"), Locale::En);
    }
}
