//! Translator - Converts between the diffusion-server request/response shape
//! and the upstream chat-completion shape

pub mod base64;
pub mod images;
pub mod info;
pub mod request;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::traits::{ChatMessage, ImageFetcher};
use images::ImageSource;

pub use info::GenerationInfo;
pub use request::{build_outbound, GenerationRequest};

/// Response returned to txt2img/img2img callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Base64 images
    pub images: Vec<String>,
    /// The original request, echoed
    pub parameters: Value,
    /// Serialized [`GenerationInfo`]
    pub info: String,
}

/// Request/response translator
pub struct Translator {
    fetcher: Arc<dyn ImageFetcher>,
}

impl Translator {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn build_outbound(&self, request: &GenerationRequest) -> Vec<ChatMessage> {
        let messages = build_outbound(request);
        let prompt = request.build_prompt();
        info!(
            prompt = %prompt.chars().take(100).collect::<String>(),
            init_images = request.init_images.len(),
            "Translated request"
        );
        messages
    }

    /// Convert an upstream body into the inbound response shape.
    ///
    /// Remote images are downloaded one at a time. A failed download is
    /// logged and the image dropped; it never fails the conversion.
    pub async fn resolve_response(
        &self,
        upstream: &Value,
        original: &GenerationRequest,
    ) -> GenerationResponse {
        let sources = images::collect_image_sources(upstream);
        info!(count = sources.len(), "Found image references");

        let mut resolved = Vec::with_capacity(sources.len());
        for source in sources {
            match source {
                ImageSource::Inline(b64) => resolved.push(b64),
                ImageSource::Remote(url) => {
                    if let Some(b64) = self.download(&url).await {
                        resolved.push(b64);
                    }
                }
            }
        }

        let metadata = GenerationInfo::from_parameters(&original.parameters);
        let info = serde_json::to_string(&metadata).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize generation info");
            "{}".to_string()
        });

        info!(images = resolved.len(), "Response converted");

        GenerationResponse {
            images: resolved,
            parameters: original.parameters.clone(),
            info,
        }
    }

    async fn download(&self, url: &str) -> Option<String> {
        let shown: String = url.chars().take(80).collect();
        info!(url = %shown, "Downloading image");

        match self.fetcher.fetch_image(url).await {
            Ok(bytes) => Some(base64::encode(&bytes)),
            Err(e) => {
                warn!(url = %shown, error = %e, "Image download failed");
                None
            }
        }
    }
}
