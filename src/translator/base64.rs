//! Base64 and data-URL helpers

use base64::{engine::general_purpose::STANDARD, Engine};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Wrap a bare base64 payload in a data URL. Data URLs pass through unchanged.
pub fn to_data_url(payload: &str, format: &str) -> String {
    if payload.starts_with("data:") {
        payload.to_string()
    } else {
        format!("data:image/{};base64,{}", format, payload)
    }
}
