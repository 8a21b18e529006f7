//! HTTP client for chat-completion endpoints and image downloads

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::backend::traits::{ChatBackend, ChatCompletionRequest, ImageFetcher};
use crate::error::{AppError, Result};
use crate::pool::{CallPolicy, Endpoint};

/// Upstream bodies are truncated to this many characters in logs and errors
const BODY_PREVIEW_CHARS: usize = 300;

/// reqwest-based backend. Redirects are followed on both clients.
pub struct HttpBackend {
    client: Client,
    download_client: Client,
}

impl HttpBackend {
    /// Create a backend. `download_timeout` bounds each image download and is
    /// independent of the per-call timeout passed to `chat_completion`.
    pub fn new(download_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let download_client = Client::builder()
            .timeout(download_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create download client: {}", e)))?;

        Ok(Self {
            client,
            download_client,
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(BODY_PREVIEW_CHARS).collect()
}

fn network_error(endpoint: &str, e: &reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Network(format!("Request to {} timed out", endpoint))
    } else {
        AppError::Network(format!("Request to {} failed: {}", endpoint, e))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat_completion(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
        policy: &CallPolicy,
    ) -> Result<Value> {
        info!(endpoint = %endpoint.name, url = %endpoint.api_url, "POST chat completion");
        if policy.detailed_log {
            if let Ok(body) = serde_json::to_string(request) {
                debug!(body = %preview(&body), "Upstream request body");
            }
        }

        let mut builder = self.client.post(&endpoint.api_url).timeout(policy.timeout).json(request);
        if !endpoint.api_key.is_empty() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", endpoint.api_key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| network_error(&endpoint.api_url, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| network_error(&endpoint.api_url, &e))?;

        info!(endpoint = %endpoint.name, status = status.as_u16(), "Upstream responded");

        if status != StatusCode::OK {
            let body = preview(&text);
            error!(endpoint = %endpoint.name, status = status.as_u16(), body = %body, "Upstream error response");
            return Err(AppError::UpstreamHttp {
                status: status.as_u16(),
                message: body,
            });
        }

        if policy.detailed_log {
            debug!(body = %preview(&text), "Upstream response body");
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::UpstreamParse(format!("{}: {}", e, preview(&text))))?;

        if let Some(marker) = value.get("error") {
            return Err(AppError::UpstreamHttp {
                status: status.as_u16(),
                message: preview(&marker.to_string()),
            });
        }

        Ok(value)
    }
}

#[async_trait]
impl ImageFetcher for HttpBackend {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::Download(format!("{}: HTTP {}", url, status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Download(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}
