//! Inbound txt2img/img2img requests and their translation to chat messages

use serde_json::Value;

use super::base64;
use crate::backend::traits::{ChatMessage, ContentPart, ImageUrl};
use crate::error::{AppError, Result};

/// An inbound generation request.
///
/// The raw JSON object is kept so it can be echoed back verbatim as the
/// response `parameters`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub init_images: Vec<String>,
    pub parameters: Value,
}

impl GenerationRequest {
    pub fn from_value(parameters: Value) -> Result<Self> {
        if !parameters.is_object() {
            return Err(AppError::InvalidRequest(
                "request body must be a JSON object".to_string(),
            ));
        }

        let prompt = parameters
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let negative_prompt = parameters
            .get("negative_prompt")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let init_images = parameters
            .get("init_images")
            .and_then(Value::as_array)
            .map(|images| {
                images
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            prompt,
            negative_prompt,
            init_images,
            parameters,
        })
    }

    /// Prompt text sent upstream. The upstream has no negative-prompt field,
    /// so it is appended inline as `--no <negative>`.
    pub fn build_prompt(&self) -> String {
        match &self.negative_prompt {
            Some(negative) => format!("{} --no {}", self.prompt, negative),
            None => self.prompt.clone(),
        }
    }
}

/// Build the upstream message list for a request.
///
/// The first init image, if any, is attached as a second multi-part message.
pub fn build_outbound(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::user(request.build_prompt())];

    if let Some(init_image) = request.init_images.first() {
        messages.push(ChatMessage::user(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: base64::to_data_url(init_image, "png"),
                },
            },
            ContentPart::Text {
                text: format!("Based on this image, {}", request.prompt),
            },
        ]));
    }

    messages
}
