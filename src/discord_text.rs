use poise::serenity_prelude as serenity;
use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\[\]]+").expect("url regex is valid"));

pub fn strip_bot_mentions(input: &str, bot_id: u64) -> String {
    let mention = format!("<@{}>", bot_id);
    let mention_nick = format!("<@!{}>", bot_id);

    input
        .replace(&mention, "")
        .replace(&mention_nick, "")
        .trim()
        .to_string()
}

/// Message content followed by the text of its embeds, one part per line.
pub fn extract_message_text(message: &serenity::Message) -> String {
    let mut parts = Vec::new();

    let content = message.content.trim();
    if !content.is_empty() {
        parts.push(content.to_string());
    }

    for embed in &message.embeds {
        for text in [&embed.title, &embed.description].into_iter().flatten() {
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }

        for field in &embed.fields {
            match (field.name.trim(), field.value.trim()) {
                ("", "") => {}
                ("", value) => parts.push(value.to_string()),
                (name, "") => parts.push(name.to_string()),
                (name, value) => parts.push(format!("{}: {}", name, value)),
            }
        }
    }

    parts.join("\n")
}

/// Every http(s) URL in `text`, in order, without duplicates. Trailing
/// sentence punctuation is not part of the URL.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in URL_RE.find_iter(text) {
        let url = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', '"', '\'']);
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Splits `text` into pieces of at most `limit` characters, preferring line
/// breaks, then spaces, as cut points.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..hard];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard);

        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].strip_prefix(['\n', ' ']).unwrap_or(&rest[cut..]);
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_both_mention_forms() {
        assert_eq!(strip_bot_mentions("<@42> hello <@!42>", 42), "hello");
        assert_eq!(strip_bot_mentions("<@43> hello", 42), "<@43> hello");
    }

    #[test]
    fn extracts_urls_once() {
        let text = "See https://devana.ai/docs, and http://example.com/a?b=1.\nAgain https://devana.ai/docs";
        assert_eq!(
            extract_urls(text),
            vec![
                "https://devana.ai/docs".to_string(),
                "http://example.com/a?b=1".to_string()
            ]
        );
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 2000), vec!["hello".to_string()]);
        assert_eq!(split_message("", 2000), vec![String::new()]);
    }

    #[test]
    fn splits_on_line_breaks_first() {
        let text = format!("{}\n{}", "a".repeat(8), "b".repeat(8));
        assert_eq!(split_message(&text, 10), vec!["a".repeat(8), "b".repeat(8)]);
    }

    #[test]
    fn hard_cuts_long_words_on_char_boundaries() {
        let text = "é".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
