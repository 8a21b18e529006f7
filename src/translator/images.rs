//! Image reference discovery in upstream responses

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Where an image's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Must be downloaded and re-encoded
    Remote(String),
    /// Already base64
    Inline(String),
}

fn markdown_image() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[.*?\]\((https?://[^\s)]+)\)").expect("valid regex"))
}

fn bare_image_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(https?://[^\s)"'<>]+\.(?:png|jpg|jpeg|webp|gif)(?:\?[^\s)"'<>]*)?)"#)
            .expect("valid regex")
    })
}

/// Extract image URLs from message text.
///
/// Markdown image links win; bare URLs with an image extension are only
/// considered when the text has no markdown images.
pub fn extract_image_urls(content: &str) -> Vec<String> {
    let capture = |re: &Regex| -> Vec<String> {
        re.captures_iter(content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim_end_matches(')').to_string())
            .collect()
    };

    let urls = capture(markdown_image());
    if urls.is_empty() {
        capture(bare_image_url())
    } else {
        urls
    }
}

/// Collect image sources from `choices[].message.content` and `data[]`, in that order
pub fn collect_image_sources(response: &Value) -> Vec<ImageSource> {
    let mut sources = Vec::new();

    let choices = response.get("choices").and_then(Value::as_array);
    for choice in choices.into_iter().flatten() {
        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str);
        if let Some(content) = content {
            sources.extend(extract_image_urls(content).into_iter().map(ImageSource::Remote));
        }
    }

    let data = response.get("data").and_then(Value::as_array);
    for item in data.into_iter().flatten() {
        if let Some(url) = item.get("url").and_then(Value::as_str) {
            sources.push(ImageSource::Remote(url.to_string()));
        } else if let Some(b64) = item.get("b64_json").and_then(Value::as_str) {
            sources.push(ImageSource::Inline(b64.to_string()));
        }
    }

    sources
}
