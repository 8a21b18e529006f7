//! Backend module - Upstream wire types, traits and the HTTP client

pub mod http_backend;
pub mod traits;

pub use http_backend::HttpBackend;
pub use traits::{ChatBackend, ChatCompletionRequest, ChatMessage, ImageFetcher};
