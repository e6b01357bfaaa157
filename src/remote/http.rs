//! HTTP implementation of the remote chat-history provider
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET /sync/all` returns `{ "chats": [...], "messages": [...] }`
//! - `PUT /chats/{id}/autorename` returns the renamed chat
//! - `DELETE /chats/{id}` deletes the chat
//!
//! Every request carries `Authorization: Bearer <token>` when a token is set.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{RemoteChatProvider, SyncSnapshot};
use crate::config::RemoteConfig;
use crate::error::{ChatweaveError, Result};

/// Remote provider over HTTP
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenamedChat {
    name: String,
}

impl HttpRemote {
    /// Create a new remote client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ChatweaveError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ChatweaveError::Network {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

#[async_trait]
impl RemoteChatProvider for HttpRemote {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<SyncSnapshot> {
        let response = self.send(self.request(reqwest::Method::GET, "/sync/all")).await?;
        let snapshot: SyncSnapshot = response.json().await?;
        debug!(
            chats = snapshot.chats.len(),
            messages = snapshot.messages.len(),
            "Fetched remote snapshot"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn autorename(&self, chat_id: &str) -> Result<String> {
        let path = format!("/chats/{}/autorename", chat_id);
        let response = self.send(self.request(reqwest::Method::PUT, &path)).await?;
        let renamed: RenamedChat = response.json().await?;
        Ok(renamed.name)
    }

    #[instrument(skip(self))]
    async fn delete(&self, chat_id: &str) -> Result<()> {
        let path = format!("/chats/{}", chat_id);
        self.send(self.request(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote_for(server: &MockServer) -> HttpRemote {
        HttpRemote::new(&RemoteConfig {
            base_url: server.uri(),
            auth_token: Some("tok".to_string()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/all"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chats": [{"id": "c1", "name": "Trip"}],
                "messages": [{"id": "m1", "chat_id": "c1", "role": "user", "text": "hi",
                              "created_at": "2024-01-01T00:00:00Z"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = remote_for(&server).fetch_all().await.unwrap();
        assert_eq!(snapshot.chats.len(), 1);
        assert_eq!(snapshot.messages[0].chat_id, "c1");
    }

    #[tokio::test]
    async fn test_fetch_all_failure_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/all"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let error = remote_for(&server).fetch_all().await.unwrap_err();
        match error.downcast_ref::<ChatweaveError>() {
            Some(ChatweaveError::Network { status, message }) => {
                assert_eq!(*status, 503);
                assert_eq!(message, "down");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_autorename() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/chats/c1/autorename"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "c1", "name": "Weekend Trip"
            })))
            .mount(&server)
            .await;

        let name = remote_for(&server).autorename("c1").await.unwrap();
        assert_eq!(name, "Weekend Trip");
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/chats/c1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/chats/c2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let remote = remote_for(&server);
        assert!(remote.delete("c1").await.is_ok());
        assert!(remote.delete("c2").await.is_err());
    }
}
