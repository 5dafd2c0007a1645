use serde::{Deserialize, Serialize};

/// Models known to the backend when its model enum cannot be queried.
pub const DEFAULT_MODELS: &[&str] = &[
    "GPT4",
    "GPT35",
    "LLAMA2",
    "LLAMA2_13B",
    "CLAUDE_V2",
    "CLAUDE_V21",
    "TITAN_EMBED_TEXT_V1",
    "JURRASIC_2_MID",
    "JURRASIC_2_ULTRA",
    "CLAUDE_V2_EU",
    "TITAN_EMBED_TEXT_V1_EU",
    "JURRASIC_2_MID_EU",
    "JURRASIC_2_ULTRA_EU",
    "MISTRAL_7B",
    "MAXTRAL_BY_MISTRAL",
    "LLAMA2_CODE",
    "GEMINI",
    "GPT4_TURBO",
];

pub const DEFAULT_MODEL: &str = "GPT4";

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edges<T> {
    pub edges: Vec<T>,
}

impl<T> Default for Edges<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    /// Agents currently using this knowledge base
    #[serde(default, rename = "ias")]
    pub agents: Edges<Agent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub ids: Vec<String>,
}

/// A file handed to the upload endpoint.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn text(file_name: impl Into<String>, content: &str) -> Self {
        Self {
            file_name: file_name.into(),
            mime: "text/plain".to_string(),
            bytes: content.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    #[default]
    Freedom,
    Limited,
    Strict,
}

impl IdentityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityType::Freedom => "FREEDOM",
            IdentityType::Limited => "LIMITED",
            IdentityType::Strict => "STRICT",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub sources: bool,
    pub public: bool,
    pub internet: bool,
}

/// Everything needed to create an agent on the backend.
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    pub name: String,
    pub description: Option<String>,
    pub model: Option<String>,
    pub knowledge_bases: Vec<String>,
    pub options: AgentOptions,
    pub identity_type: IdentityType,
    pub identity_prompt: Option<String>,
}

/// Agent traits the helper agent extracts from a free-form description.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentTraits {
    pub model: Option<String>,
    pub internet: bool,
    pub public: bool,
    pub sources: bool,
    pub identity: Option<IdentityType>,
}

impl AgentTraits {
    /// Lenient parse: anything that is not the expected JSON yields defaults.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let body = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => trimmed,
        };
        serde_json::from_str(body).unwrap_or_default()
    }

    pub fn into_spec(
        self,
        name: String,
        description: Option<String>,
        identity_prompt: Option<String>,
        knowledge_base_id: String,
    ) -> AgentSpec {
        AgentSpec {
            name,
            description,
            model: Some(self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string())),
            knowledge_bases: vec![knowledge_base_id],
            options: AgentOptions {
                sources: self.sources,
                public: self.public,
                internet: self.internet,
            },
            identity_type: self.identity.unwrap_or_default(),
            identity_prompt,
        }
    }
}
