//! Static informational responses that diffusion-server clients probe for

use axum::Json;
use serde_json::{json, Value};

pub async fn sd_models() -> Json<Value> {
    Json(json!([{"title": "OpenAI-Bridge", "model_name": "openai-bridge", "hash": "abc123"}]))
}

pub async fn sd_vae() -> Json<Value> {
    Json(json!([{"model_name": "Automatic", "filename": "auto"}]))
}

pub async fn samplers() -> Json<Value> {
    Json(json!([{"name": "Euler", "aliases": ["euler"], "options": {}}]))
}

pub async fn upscalers() -> Json<Value> {
    Json(json!([{"name": "None", "model_name": null}]))
}

pub async fn latent_upscale_modes() -> Json<Value> {
    Json(json!([{"name": "Latent"}]))
}

pub async fn face_restorers() -> Json<Value> {
    Json(json!([{"name": "None"}]))
}

pub async fn schedulers() -> Json<Value> {
    Json(json!([{"name": "automatic", "label": "Automatic"}]))
}

pub async fn get_options() -> Json<Value> {
    Json(json!({"sd_model_checkpoint": "openai-bridge.safetensors"}))
}

pub async fn progress() -> Json<Value> {
    Json(json!({"progress": 0, "eta_relative": 0, "state": {"job": ""}, "current_image": null}))
}

pub async fn memory() -> Json<Value> {
    Json(json!({
        "ram": {"free": 8_000_000_000u64, "used": 4_000_000_000u64, "total": 12_000_000_000u64},
        "cuda": {"free": 8_000_000_000u64, "used": 4_000_000_000u64, "total": 12_000_000_000u64}
    }))
}

pub async fn empty_object() -> Json<Value> {
    Json(json!({}))
}

pub async fn scripts() -> Json<Value> {
    Json(json!({"txt2img": [], "img2img": []}))
}

pub async fn embeddings() -> Json<Value> {
    Json(json!({"loaded": {}, "skipped": {}}))
}

pub async fn empty_list() -> Json<Value> {
    Json(json!([]))
}

/// Accepted and ignored: options writes, interrupt, skip
pub async fn accepted() -> Json<Value> {
    Json(json!({"status": "success"}))
}

pub async fn png_info() -> Json<Value> {
    Json(json!({"info": "", "items": {}}))
}

pub async fn extra_single_image() -> Json<Value> {
    Json(json!({"html_info": "", "image": ""}))
}

pub async fn extra_batch_images() -> Json<Value> {
    Json(json!({"html_info": "", "images": []}))
}

pub async fn interrogate() -> Json<Value> {
    Json(json!({"caption": "a beautiful image"}))
}
