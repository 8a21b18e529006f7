//! Common error types for the bridge gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("No API endpoints configured")]
    NoEndpointsConfigured,

    #[error("No API endpoint available")]
    NoEndpointAvailable,

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    UpstreamHttp { status: u16, message: String },

    #[error("Malformed upstream response: {0}")]
    UpstreamParse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Image download failed: {0}")]
    Download(String),

    #[error("[{endpoint}] all retries failed: {last_error}")]
    EndpointsExhausted { endpoint: String, last_error: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a single outbound attempt that produced this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamHttp { .. }
                | AppError::UpstreamParse(_)
                | AppError::Network(_)
                | AppError::HttpClient(_)
        )
    }
}

/// Error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "upstream_error", None),
            AppError::NoEndpointsConfigured => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("no_endpoints_configured")),
            AppError::NoEndpointAvailable => (StatusCode::SERVICE_UNAVAILABLE, "server_error", Some("no_endpoint_available")),
            AppError::EndpointNotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", Some("endpoint_not_found")),
            AppError::UpstreamHttp { .. } => (StatusCode::BAD_GATEWAY, "upstream_error", None),
            AppError::UpstreamParse(_) => (StatusCode::BAD_GATEWAY, "upstream_error", Some("malformed_response")),
            AppError::Network(_) => (StatusCode::BAD_GATEWAY, "upstream_error", Some("network_error")),
            AppError::Download(_) => (StatusCode::BAD_GATEWAY, "upstream_error", Some("download_failed")),
            AppError::EndpointsExhausted { .. } => (StatusCode::BAD_GATEWAY, "upstream_error", Some("endpoints_exhausted")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
