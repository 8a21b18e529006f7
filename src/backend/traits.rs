//! Upstream wire types and the traits the gateway calls through

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::pool::{CallPolicy, Endpoint};

/// One chat message sent upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Message content: plain text or multi-part (text and images)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Body POSTed to an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
}

/// Chat-completion backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one request to `endpoint` and return the parsed JSON body.
    /// `policy.timeout` bounds the whole exchange.
    ///
    /// Any non-200 status, a body that is not JSON, or a body carrying a
    /// top-level `error` marker is an error.
    async fn chat_completion(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
        policy: &CallPolicy,
    ) -> Result<Value>;
}

/// Downloads images referenced by upstream responses
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}
