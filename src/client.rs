//! Connection to the remote chat service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;

use crate::error::ServiceError;
use crate::graph::WorkflowGraphState;
use crate::message::{ChatRequest, ChatResponse};

pub const CHAT_PATH: &str = "/api/v1/chat/";
pub const GRAPH_STRUCTURE_PATH: &str = "/api/v1/chat/graph/structure";

/// The remote side of a conversation.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send one chat turn carrying the full history.
    async fn send_turn(&self, request: &ChatRequest) -> Result<ChatResponse, ServiceError>;

    /// Fetch the static workflow graph.
    async fn graph_structure(&self) -> Result<WorkflowGraphState, ServiceError>;
}

/// `ChatService` over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpChatService {
    client: Client,
    base_url: String,
}

impl HttpChatService {
    /// `timeout` bounds each whole request; an elapsed timeout is reported as a
    /// transport failure.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn send_turn(&self, request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
        let url = self.endpoint(CHAT_PATH);
        tracing::debug!(
            %url,
            messages = request.messages.len(),
            user_id = %request.user_id,
            "sending chat turn"
        );

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        read_json(response).await
    }

    async fn graph_structure(&self) -> Result<WorkflowGraphState, ServiceError> {
        let url = self.endpoint(GRAPH_STRUCTURE_PATH);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        read_json(response).await
    }
}

// The body is read as text first so the raw payload can be reported when it
// does not parse.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.text().await?;
    tracing::debug!(status = status.as_u16(), bytes = body.len(), "chat service responded");

    if !status.is_success() {
        return Err(ServiceError::status(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, raw = %body, "failed to parse chat service response");
        ServiceError::Protocol(format!("invalid JSON response from server: {e}"))
    })
}
