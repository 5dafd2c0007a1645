use super::models::{
    Agent, AgentSpec, AskResponse, Document, Edges, GraphqlResponse, KnowledgeBase,
    UploadResponse, DEFAULT_MODEL, DEFAULT_MODELS,
};
use super::stream::{open_chat_stream, ChatStream};
use super::token::TokenManager;
use crate::config::Config;
use crate::error::{BackendError, BotError, BotResult};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const AGENTS_QUERY: &str = r#"query getAllMyIAs($take: Int, $skip: Int, $search: String) {
  getAllMyIAs(take: $take, skip: $skip, search: $search) {
    edges { id name }
  }
}"#;

const KNOWLEDGE_BASES_QUERY: &str = r#"query GetAllFoldersPagination($take: Int, $skip: Int, $search: String) {
  getFoldersPagination(take: $take, skip: $skip, search: $search) {
    edges {
      id
      name
      ias { edges { id name } }
    }
  }
}"#;

const KNOWLEDGE_BASE_QUERY: &str = r#"query GetFolder($id: String!) {
  getFolder(id: $id) {
    id
    name
    ias { edges { id name } }
  }
}"#;

const MODELS_QUERY: &str = r#"query GetModels {
  __type(name: "TypeLLMEnum") {
    name
    enumValues { name }
  }
}"#;

const UPSERT_AGENT_MUTATION: &str = r#"mutation UpsertMyIAs(
  $id: ID, $name: String!, $description: String, $backgroundColor: String,
  $textColor: String, $iaType: IATypes!, $welcomeMessage: String, $publicChat: Boolean,
  $overrideUrl: String, $iaIdentity: String, $freeLevel: String, $showSources: Boolean,
  $suggestions: [String], $model: String, $folderIds: [String], $connectWeb: Boolean
) {
  upsertMyIAs(
    id: $id, name: $name, description: $description, backgroundColor: $backgroundColor,
    textColor: $textColor, iaType: $iaType, welcomeMessage: $welcomeMessage,
    publicChat: $publicChat, showSources: $showSources, overrideUrl: $overrideUrl,
    iaIdentity: $iaIdentity, freeLevel: $freeLevel, suggestions: $suggestions,
    model: $model, folderIds: $folderIds, connectWeb: $connectWeb
  ) { id name }
}"#;

const DELETE_AGENT_MUTATION: &str = r#"mutation DeleteMyIAs($id: String!) {
  deleteMyIAs(id: $id)
}"#;

const CREATE_FOLDER_MUTATION: &str = r#"mutation createFolder($name: String!, $id: String) {
  upsetFolder(name: $name, id: $id) { id name }
}"#;

const DELETE_FOLDER_MUTATION: &str = r#"mutation DeleteFolder($id: String!) {
  deleteFolder(id: $id)
}"#;

const ADD_WEBSITES_MUTATION: &str = r#"mutation AddWebsites($folderId: String!, $urls: [String!]!) {
  upsertWebsites(folderId: $folderId, urls: $urls) { id }
}"#;

#[derive(Deserialize)]
struct AgentsData {
    #[serde(rename = "getAllMyIAs")]
    agents: Edges<Agent>,
}

#[derive(Deserialize)]
struct KnowledgeBasesData {
    #[serde(rename = "getFoldersPagination")]
    folders: Edges<KnowledgeBase>,
}

#[derive(Deserialize)]
struct KnowledgeBaseData {
    #[serde(rename = "getFolder")]
    folder: Option<KnowledgeBase>,
}

#[derive(Deserialize)]
struct ModelsData {
    #[serde(rename = "__type")]
    model_type: Option<EnumType>,
}

#[derive(Deserialize)]
struct EnumType {
    #[serde(rename = "enumValues")]
    values: Vec<EnumValue>,
}

#[derive(Deserialize)]
struct EnumValue {
    name: String,
}

#[derive(Deserialize)]
struct UpsertAgentData {
    #[serde(rename = "upsertMyIAs")]
    agent: Agent,
}

#[derive(Deserialize)]
struct UpsertFolderData {
    #[serde(rename = "upsetFolder")]
    folder: KnowledgeBase,
}

/// Sends one GraphQL operation and unwraps its `data` payload.
pub(crate) async fn post_graphql<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    operation: &str,
    query: &str,
    variables: Value,
) -> Result<T, BackendError> {
    debug!("Devana: {} request", operation);
    let mut request = http.post(url).json(&json!({
        "operationName": operation,
        "variables": variables,
        "query": query,
    }));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        return Err(BackendError::new(message, status.as_u16()));
    }

    let body: GraphqlResponse<T> = response.json().await?;
    if let Some(err) = body.errors.first() {
        return Err(BackendError::new(err.message.clone(), status.as_u16()));
    }
    body.data
        .ok_or_else(|| BackendError::new(format!("{} returned no data", operation), 500))
}

/// Typed wrapper around the Devana query API.
pub struct DevanaClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
}

impl DevanaClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self::with_http(
            http,
            &config.devana_api_url,
            config.devana_login.clone(),
            config.devana_password.clone(),
        ))
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: &str,
        email: String,
        password: String,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let tokens = TokenManager::new(
            http.clone(),
            format!("{}/graphql", base_url),
            email,
            password,
        );
        Self {
            http,
            // SSE connections stay open for the whole answer, so no overall timeout.
            stream_http: reqwest::Client::new(),
            base_url,
            tokens,
        }
    }

    /// Forces a new login, replacing the held token.
    pub async fn login(&self) -> BotResult<()> {
        self.tokens.refresh().await?;
        Ok(())
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> BotResult<T> {
        let token = self.tokens.token().await?;
        let url = format!("{}/graphql", self.base_url);
        let result = post_graphql(&self.http, &url, Some(&token), operation, query, variables).await;
        if let Err(e) = &result {
            error!("Devana: {} failed: {}", operation, e);
        }
        self.expire_on_unauthorized(result.map_err(BotError::from)).await
    }

    /// A 401 means the held token expired; the failed call is not retried.
    async fn expire_on_unauthorized<T>(&self, result: BotResult<T>) -> BotResult<T> {
        if let Err(BotError::Backend(e)) = &result {
            if e.status_code == StatusCode::UNAUTHORIZED.as_u16() {
                self.tokens.invalidate().await;
            }
        }
        result
    }

    pub async fn list_agents(&self, search: &str) -> BotResult<Vec<Agent>> {
        let data: AgentsData = self
            .graphql("getAllMyIAs", AGENTS_QUERY, json!({ "search": search }))
            .await?;
        Ok(data.agents.edges)
    }

    /// Exact name match among the agents the backend returns for `name`.
    pub async fn find_agent_by_name(&self, name: &str) -> BotResult<Option<Agent>> {
        let agents = self.list_agents(name).await?;
        Ok(pick_by_name(agents, name, |a| &a.name))
    }

    pub async fn list_knowledge_bases(&self, search: &str) -> BotResult<Vec<KnowledgeBase>> {
        let data: KnowledgeBasesData = self
            .graphql(
                "GetAllFoldersPagination",
                KNOWLEDGE_BASES_QUERY,
                json!({ "search": search }),
            )
            .await?;
        Ok(data.folders.edges)
    }

    pub async fn find_knowledge_base_by_name(&self, name: &str) -> BotResult<Option<KnowledgeBase>> {
        let folders = self.list_knowledge_bases(name).await?;
        Ok(pick_by_name(folders, name, |f| &f.name))
    }

    pub async fn get_knowledge_base(&self, id: &str) -> BotResult<Option<KnowledgeBase>> {
        let data: KnowledgeBaseData = self
            .graphql("GetFolder", KNOWLEDGE_BASE_QUERY, json!({ "id": id }))
            .await?;
        Ok(data.folder)
    }

    pub async fn delete_agent(&self, id: &str) -> BotResult<()> {
        let _: Value = self
            .graphql("DeleteMyIAs", DELETE_AGENT_MUTATION, json!({ "id": id }))
            .await?;
        info!("Devana: deleted agent {}", id);
        Ok(())
    }

    pub async fn delete_knowledge_base(&self, id: &str) -> BotResult<()> {
        let _: Value = self
            .graphql("DeleteFolder", DELETE_FOLDER_MUTATION, json!({ "id": id }))
            .await?;
        info!("Devana: deleted knowledge base {}", id);
        Ok(())
    }

    /// Model names from the backend's `TypeLLMEnum`.
    pub async fn models(&self) -> BotResult<Vec<String>> {
        let data: ModelsData = self.graphql("GetModels", MODELS_QUERY, json!({})).await?;
        let values = data
            .model_type
            .map(|t| t.values.into_iter().map(|v| v.name).collect::<Vec<_>>())
            .unwrap_or_default();
        if values.is_empty() {
            return Err(BackendError::new("TypeLLMEnum has no values", 500).into());
        }
        Ok(values)
    }

    /// Backend models, or the built-in list when the backend cannot tell.
    pub async fn valid_models(&self) -> Vec<String> {
        match self.models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("Devana: model list unavailable, using built-in list: {}", e);
                DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
            }
        }
    }

    pub async fn create_agent(&self, spec: &AgentSpec) -> BotResult<Agent> {
        if let Some(model) = &spec.model {
            let models = self.valid_models().await;
            if !models.iter().any(|m| m == model) {
                return Err(BotError::InvalidModel(model.clone()));
            }
        }

        let variables = json!({
            "id": null,
            "name": spec.name,
            "description": spec.description.clone().unwrap_or_default(),
            "textColor": "#000000",
            "backgroundColor": "#ffffff",
            "suggestions": [""],
            "welcomeMessage": "",
            "overrideUrl": "https://",
            "iaIdentity": spec.identity_prompt.clone().unwrap_or_default(),
            "freeLevel": spec.identity_type.as_str(),
            "model": spec.model.as_deref().unwrap_or(DEFAULT_MODEL),
            "iaType": "ASSISTANT",
            "folderIds": spec.knowledge_bases,
            "showSources": spec.options.sources,
            "publicChat": spec.options.public,
            "connectWeb": spec.options.internet,
        });

        let data: UpsertAgentData = self
            .graphql("UpsertMyIAs", UPSERT_AGENT_MUTATION, variables)
            .await
            .map_err(|e| match e {
                BotError::Backend(inner) => {
                    BotError::Backend(BackendError::new("Error creating agent.", inner.status_code))
                }
                other => other,
            })?;
        info!("Devana: created agent {} ({})", data.agent.name, data.agent.id);
        Ok(data.agent)
    }

    /// Creates an empty knowledge base.
    pub async fn create_knowledge_base_skeleton(&self, name: &str) -> BotResult<KnowledgeBase> {
        let data: UpsertFolderData = self
            .graphql(
                "createFolder",
                CREATE_FOLDER_MUTATION,
                json!({ "name": name, "id": null }),
            )
            .await?;
        info!("Devana: created knowledge base {} ({})", data.folder.name, data.folder.id);
        Ok(data.folder)
    }

    /// Registers web pages to be crawled into a knowledge base.
    pub async fn add_websites(&self, knowledge_base_id: &str, urls: &[String]) -> BotResult<()> {
        if urls.is_empty() {
            return Ok(());
        }
        let _: Value = self
            .graphql(
                "AddWebsites",
                ADD_WEBSITES_MUTATION,
                json!({ "folderId": knowledge_base_id, "urls": urls }),
            )
            .await?;
        Ok(())
    }

    /// Uploads documents into a knowledge base in one multipart call.
    pub async fn upload_documents(
        &self,
        knowledge_base_id: &str,
        documents: Vec<Document>,
    ) -> BotResult<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut form = Form::new();
        for doc in documents {
            let part = Part::bytes(doc.bytes)
                .file_name(doc.file_name)
                .mime_str(&doc.mime)?;
            form = form.part("file", part);
        }

        let token = self.tokens.token().await?;
        let response = self
            .http
            .post(format!("{}/api/upload", self.base_url))
            .bearer_auth(token)
            .header("Folder", knowledge_base_id)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Devana: upload to {} failed: {} {}", knowledge_base_id, status, body);
            return self
                .expire_on_unauthorized(Err(BackendError::new(body, status.as_u16()).into()))
                .await;
        }
        let body: UploadResponse = response.json().await?;
        Ok(body.ids)
    }

    /// Downloads a remote file (a Discord attachment) for upload.
    pub async fn fetch_document(&self, url: &str, file_name: &str) -> BotResult<Document> {
        let fetch_err = |reason: String| BotError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_err(response.status().to_string()));
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(Document {
            file_name: file_name.to_string(),
            mime,
            bytes: bytes.to_vec(),
        })
    }

    /// Fetches every source file, then uploads them together.
    pub async fn upload_remote_documents(
        &self,
        knowledge_base_id: &str,
        sources: &[(String, String)],
    ) -> BotResult<Vec<String>> {
        let fetches = sources
            .iter()
            .map(|(url, name)| self.fetch_document(url, name));
        let documents = futures::future::try_join_all(fetches).await?;
        self.upload_documents(knowledge_base_id, documents).await
    }

    /// Asks an agent and waits for the whole answer.
    pub async fn ask(
        &self,
        agent_id: &str,
        prompt: &str,
        chat_id: Option<&str>,
        files: &[String],
    ) -> BotResult<AskResponse> {
        let token = self.tokens.token().await?;
        let files = files.join(",");
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, agent_id))
            .bearer_auth(token)
            .query(&[
                ("prompt", prompt),
                ("chatId", chat_id.unwrap_or_default()),
                ("files", files.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Devana: ask {} failed: {} {}", agent_id, status, body);
            return self
                .expire_on_unauthorized(Err(BackendError::new(body, status.as_u16()).into()))
                .await;
        }
        Ok(response.json().await?)
    }

    /// Opens the server-sent-events chat stream for an agent.
    pub async fn ask_stream(
        &self,
        agent_id: &str,
        message: &str,
        chat_id: Option<&str>,
        files: &[String],
    ) -> BotResult<ChatStream> {
        let token = self.tokens.token().await?;
        let files = files.join(",");
        let request = self
            .stream_http
            .get(format!("{}/chat/{}", self.base_url, agent_id))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .query(&[
                ("message", message),
                ("chatId", chat_id.unwrap_or_default()),
                ("files", files.as_str()),
                ("token", token.as_str()),
            ]);
        self.expire_on_unauthorized(open_chat_stream(request).await)
            .await
    }
}

fn pick_by_name<T>(items: Vec<T>, name: &str, key: impl Fn(&T) -> &String) -> Option<T> {
    let mut fallback = None;
    for item in items {
        if key(&item) == name {
            return Some(item);
        }
        if fallback.is_none() && key(&item).eq_ignore_ascii_case(name) {
            fallback = Some(item);
        }
    }
    fallback
}
