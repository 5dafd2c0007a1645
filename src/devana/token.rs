use super::client::post_graphql;
use crate::error::BackendError;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

const LOGIN_QUERY: &str = r#"mutation Login($email: String!, $password: String!) {
  login(email: $email, password: $password)
}"#;

#[derive(Deserialize)]
struct LoginData {
    login: String,
}

/// Owns the bearer token used by every backend request.
///
/// The token is obtained lazily on first use, replaced through
/// [`TokenManager::refresh`] and dropped by [`TokenManager::invalidate`] once
/// the backend rejects it.
pub struct TokenManager {
    http: reqwest::Client,
    graphql_url: String,
    email: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, graphql_url: String, email: String, password: String) -> Self {
        Self {
            http,
            graphql_url,
            email,
            password,
            token: RwLock::new(None),
        }
    }

    /// Current token, logging in first if none is held yet.
    pub async fn token(&self) -> Result<String, BackendError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.refresh().await
    }

    /// Logs in again and replaces the held token.
    pub async fn refresh(&self) -> Result<String, BackendError> {
        let mut slot = self.token.write().await;
        let data: LoginData = post_graphql(
            &self.http,
            &self.graphql_url,
            None,
            "Login",
            LOGIN_QUERY,
            json!({ "email": self.email, "password": self.password }),
        )
        .await?;
        info!("Devana: obtained a new access token for {}", self.email);
        *slot = Some(data.login.clone());
        Ok(data.login)
    }

    /// Drops the held token so the next request logs in again.
    pub async fn invalidate(&self) {
        if self.token.write().await.take().is_some() {
            warn!("Devana: access token rejected, logging in again on next request");
        }
    }
}
