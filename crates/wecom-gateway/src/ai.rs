//! Client for the AI assistant that answers forwarded mentions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AiConfig;

/// Value of `source` on every forwarded request.
pub const SOURCE_WEWORK: &str = "wework";

/// First retry delay; doubles on every further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub content: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl ChatRequest {
    pub fn from_wework(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content: content.into(),
            source: SOURCE_WEWORK.to_string(),
            group_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode response: {0}")]
    Decode(String),
    #[error("send message after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ForwardError>,
    },
    #[error("forward timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends a message to the assistant and returns its reply.
#[async_trait]
pub trait AiForwarder: Send + Sync {
    async fn forward(&self, request: &ChatRequest) -> Result<ChatResponse, ForwardError>;
}

/// HTTP implementation posting JSON to `{base_url}/chat`.
#[derive(Clone)]
pub struct AiClient {
    chat_url: String,
    client: reqwest::Client,
    retry: u32,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout())
            .user_agent(format!("wecom-gateway/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ForwardError::Http(e.to_string()))?;
        Ok(Self {
            chat_url: format!("{}/chat", config.base_url.trim_end_matches('/')),
            client,
            retry: config.retry,
        })
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatResponse, ForwardError> {
        let resp = self
            .client
            .post(&self.chat_url)
            .json(request)
            .send()
            .await
            .map_err(|e| ForwardError::Http(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ForwardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<ChatResponse>()
            .await
            .map_err(|e| ForwardError::Decode(e.to_string()))
    }
}

/// Delay before retry number `attempt` (0-based): 500ms, 1s, 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    BASE_BACKOFF.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}

#[async_trait]
impl AiForwarder for AiClient {
    async fn forward(&self, request: &ChatRequest) -> Result<ChatResponse, ForwardError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.retry => {
                    debug!(attempt, error = %e, "AI request attempt failed");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(last) => {
                    let attempts = attempt + 1;
                    warn!(
                        user_id = %request.user_id,
                        attempts,
                        error = %last,
                        "all retries failed for AI request"
                    );
                    return Err(ForwardError::RetriesExhausted {
                        attempts,
                        last: Box::new(last),
                    });
                }
            }
        }
    }
}
