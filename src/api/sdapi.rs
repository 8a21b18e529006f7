//! Diffusion-server compatible generation handlers

use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::translator::{GenerationRequest, GenerationResponse};
use crate::AppState;

/// `POST /sdapi/v1/txt2img`
pub async fn txt2img(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<GenerationResponse>> {
    info!(mode = "txt2img", "Generation request");
    let mut request = GenerationRequest::from_value(body)?;
    request.init_images.clear();
    generate(&state, request).await.map(Json)
}

/// `POST /sdapi/v1/img2img`
pub async fn img2img(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<GenerationResponse>> {
    info!(mode = "img2img", "Generation request");
    let request = GenerationRequest::from_value(body)?;
    generate(&state, request).await.map(Json)
}

async fn generate(state: &AppState, request: GenerationRequest) -> Result<GenerationResponse> {
    let messages = state.translator.build_outbound(&request);
    let outcome = state.orchestrator.call(&messages).await?;
    let response = state
        .translator
        .resolve_response(&outcome.response, &request)
        .await;

    info!(
        endpoint_id = %outcome.endpoint_id,
        images = response.images.len(),
        "Generation complete"
    );
    Ok(response)
}
