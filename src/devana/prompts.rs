use crate::i18n::fill;

const KNOWLEDGE_NAME: &str = "Define the following text in maximum two words without using special characters : \"%text%\"";

const AGENT_TRAITS: &str = r#"From the following text return a JSON formatted text containing :
- the model from all theses models : `%models%` (by default GPT4),
- boolean if it should be connected to internet
- boolean if it should be public
- boolean if it should show sources
- the identity between theses three choices : "FREEDOM", "LIMITED", "STRICT"

The result will be formatted as followed : {
"model": string;
"internet": boolean;
"public": boolean;
"sources": boolean;
"identity": 'FREEDOM' | 'LIMITED' | 'STRICT';
}

The text is : "%text%""#;

pub fn knowledge_name(text: &str) -> String {
    fill(KNOWLEDGE_NAME, &[text])
}

pub fn agent_traits(models: &[String], description: &str) -> String {
    let models = serde_json::to_string(models).unwrap_or_default();
    fill(AGENT_TRAITS, &[&models, description])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_traits_prompt_embeds_models_and_text() {
        let prompt = agent_traits(&["GPT4".into(), "GEMINI".into()], "makes coffee");
        assert!(prompt.contains(r#"`["GPT4","GEMINI"]`"#));
        assert!(prompt.contains("\"makes coffee\""));
    }
}
