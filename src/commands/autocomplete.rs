use crate::Context;
use tracing::warn;

/// Discord shows at most this many suggestions.
const MAX_CHOICES: usize = 25;

/// Names starting with `partial`, case-insensitively, capped to what Discord
/// can display.
pub fn filter_names(names: impl IntoIterator<Item = String>, partial: &str) -> Vec<String> {
    let partial = partial.trim().to_lowercase();
    names
        .into_iter()
        .filter(|name| name.to_lowercase().starts_with(&partial))
        .take(MAX_CHOICES)
        .collect()
}

pub async fn agents(ctx: Context<'_>, partial: &str) -> Vec<String> {
    match ctx.data().devana.list_agents(partial).await {
        Ok(agents) => filter_names(agents.into_iter().map(|a| a.name), partial),
        Err(e) => {
            warn!("Agent autocomplete failed: {}", e);
            Vec::new()
        }
    }
}

pub async fn knowledge_bases(ctx: Context<'_>, partial: &str) -> Vec<String> {
    match ctx.data().devana.list_knowledge_bases(partial).await {
        Ok(folders) => filter_names(folders.into_iter().map(|f| f.name), partial),
        Err(e) => {
            warn!("Knowledge base autocomplete failed: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_prefix_ignoring_case() {
        let names = vec!["Support Bot".to_string(), "sales".to_string(), "Docs".to_string()];
        assert_eq!(filter_names(names, "s"), vec!["Support Bot", "sales"]);
    }

    #[test]
    fn caps_choice_count() {
        let names = (0..40).map(|i| format!("agent {i}"));
        assert_eq!(filter_names(names, "").len(), MAX_CHOICES);
    }
}
