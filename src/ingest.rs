//! Turns a chat message into a populated knowledge base.

use crate::devana::models::{Document, KnowledgeBase};
use crate::devana::DevanaClient;
use crate::discord_text::extract_urls;
use crate::error::{BotError, BotResult};
use std::fmt;
use tracing::{info, warn};

/// File name given to the message text when it is uploaded.
pub const CONTENT_FILE_NAME: &str = "message.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStep {
    Websites,
    Content,
    Attachments,
}

impl fmt::Display for IngestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStep::Websites => "websites",
            IngestStep::Content => "content",
            IngestStep::Attachments => "attachments",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct IngestReport {
    pub knowledge_base: KnowledgeBase,
    /// Hydration steps that failed; the knowledge base exists regardless.
    pub failures: Vec<(IngestStep, BotError)>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_steps(&self) -> String {
        self.failures
            .iter()
            .map(|(step, _)| step.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Creates a knowledge base named `name` and fills it from `content` and
/// `attachments` (`(url, file name)` pairs).
///
/// Only the creation itself is fatal. The three hydration steps run
/// concurrently, each one independent of the others, and all of them have
/// finished when this returns.
pub async fn create_knowledge_base(
    client: &DevanaClient,
    name: &str,
    content: &str,
    attachments: &[(String, String)],
) -> BotResult<IngestReport> {
    let knowledge_base = client.create_knowledge_base_skeleton(name).await?;
    let id = knowledge_base.id.as_str();

    let urls = extract_urls(content);
    let websites = client.add_websites(id, &urls);
    let text = async {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        client
            .upload_documents(id, vec![Document::text(CONTENT_FILE_NAME, content)])
            .await
    };
    let files = client.upload_remote_documents(id, attachments);

    let (websites, text, files) = tokio::join!(websites, text, files);

    let mut failures = Vec::new();
    if let Err(e) = websites {
        failures.push((IngestStep::Websites, e));
    }
    if let Err(e) = text {
        failures.push((IngestStep::Content, e));
    }
    if let Err(e) = files {
        failures.push((IngestStep::Attachments, e));
    }
    for (step, e) in &failures {
        warn!("Ingestion into {}: {} step failed: {}", id, step, e);
    }

    info!(
        "Ingested knowledge base {} ({} urls, {} attachments, {} failed steps)",
        id,
        urls.len(),
        attachments.len(),
        failures.len()
    );
    Ok(IngestReport {
        knowledge_base,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    async fn server_with_login() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "Login" })))
            .with_status(200)
            .with_body(json!({ "data": { "login": "tok" } }).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "createFolder" })))
            .with_status(200)
            .with_body(json!({ "data": { "upsetFolder": { "id": "kb-1", "name": "Rust notes" } } }).to_string())
            .create_async()
            .await;
        server
    }

    fn client(server: &mockito::ServerGuard) -> DevanaClient {
        DevanaClient::with_http(
            reqwest::Client::new(),
            &server.url(),
            "bot@example.com".into(),
            "secret".into(),
        )
    }

    #[tokio::test]
    async fn hydrates_websites_content_and_attachments() {
        let mut server = server_with_login().await;
        let websites = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "operationName": "AddWebsites",
                "variables": { "folderId": "kb-1", "urls": ["https://doc.rust-lang.org/book"] }
            })))
            .with_status(200)
            .with_body(json!({ "data": { "upsertWebsites": true } }).to_string())
            .create_async()
            .await;
        let attachment = server
            .mock("GET", "/files/guide.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4")
            .create_async()
            .await;
        let uploads = server
            .mock("POST", "/api/upload")
            .match_header("folder", "kb-1")
            .with_status(200)
            .with_body(json!({ "ids": ["doc"] }).to_string())
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        let report = create_knowledge_base(
            &client,
            "Rust notes",
            "Read https://doc.rust-lang.org/book first.",
            &[(format!("{}/files/guide.pdf", server.url()), "guide.pdf".into())],
        )
        .await
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.knowledge_base.id, "kb-1");
        websites.assert_async().await;
        attachment.assert_async().await;
        uploads.assert_async().await;
    }

    #[tokio::test]
    async fn failed_attachment_does_not_cancel_other_steps() {
        let mut server = server_with_login().await;
        server
            .mock("GET", "/files/missing.pdf")
            .with_status(404)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/api/upload")
            .with_status(200)
            .with_body(json!({ "ids": ["doc"] }).to_string())
            .create_async()
            .await;

        let client = client(&server);
        let report = create_knowledge_base(
            &client,
            "Rust notes",
            "no links in here",
            &[(format!("{}/files/missing.pdf", server.url()), "missing.pdf".into())],
        )
        .await
        .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, IngestStep::Attachments);
        assert!(matches!(report.failures[0].1, BotError::Fetch { .. }));
        assert_eq!(report.failed_steps(), "attachments");
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn creation_failure_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "Login" })))
            .with_status(200)
            .with_body(json!({ "data": { "login": "tok" } }).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "operationName": "createFolder" })))
            .with_status(200)
            .with_body(json!({ "errors": [{ "message": "quota exceeded" }] }).to_string())
            .create_async()
            .await;

        let client = client(&server);
        let err = create_knowledge_base(&client, "x", "text", &[]).await.unwrap_err();
        assert!(matches!(err, BotError::Backend(_)));
    }
}
