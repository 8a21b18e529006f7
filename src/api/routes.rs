//! Router construction and service-level handlers

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{admin, sdapi, stubs};
use crate::error::Result;
use crate::AppState;

const SERVICE_NAME: &str = "SD-OpenAI Bridge";

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let sdapi_routes = Router::new()
        .route("/txt2img", post(sdapi::txt2img))
        .route("/img2img", post(sdapi::img2img))
        .route("/sd-models", get(stubs::sd_models))
        .route("/sd-vae", get(stubs::sd_vae))
        .route("/samplers", get(stubs::samplers))
        .route("/upscalers", get(stubs::upscalers))
        .route("/latent-upscale-modes", get(stubs::latent_upscale_modes))
        .route("/schedulers", get(stubs::schedulers))
        .route("/options", get(stubs::get_options).post(stubs::accepted))
        .route("/progress", get(stubs::progress))
        .route("/cmd-flags", get(stubs::empty_object))
        .route("/memory", get(stubs::memory))
        .route("/embeddings", get(stubs::embeddings))
        .route("/hypernetworks", get(stubs::empty_list))
        .route("/face-restorers", get(stubs::face_restorers))
        .route("/realesrgan-models", get(stubs::empty_list))
        .route("/loras", get(stubs::empty_list))
        .route("/prompt-styles", get(stubs::empty_list))
        .route("/scripts", get(stubs::scripts))
        .route("/script-info", get(stubs::empty_list))
        .route("/extensions", get(stubs::empty_list))
        .route("/refresh-checkpoints", post(stubs::accepted))
        .route("/refresh-vae", post(stubs::accepted))
        .route("/refresh-loras", post(stubs::accepted))
        .route("/unload-checkpoint", post(stubs::accepted))
        .route("/reload-checkpoint", post(stubs::accepted))
        .route("/interrupt", post(stubs::accepted))
        .route("/skip", post(stubs::accepted))
        .route("/png-info", post(stubs::png_info))
        .route("/extra-single-image", post(stubs::extra_single_image))
        .route("/extra-batch-images", post(stubs::extra_batch_images))
        .route("/interrogate", post(stubs::interrogate));

    let admin_routes = Router::new()
        .route("/config", get(admin::get_config).post(admin::update_config))
        .route("/endpoints", post(admin::add_endpoint))
        .route("/endpoints/reset-all", post(admin::reset_all_quotas))
        .route("/endpoints/unban-all", post(admin::unban_all))
        .route(
            "/endpoints/:id",
            put(admin::update_endpoint).delete(admin::delete_endpoint),
        )
        .route("/endpoints/:id/switch", post(admin::switch_endpoint))
        .route("/endpoints/:id/unban", post(admin::unban_endpoint))
        .route("/endpoints/:id/reset", post(admin::reset_quota))
        .route("/endpoints/:id/reset-stats", post(admin::reset_stats));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/internal/ping", get(ping))
        .nest("/sdapi/v1", sdapi_routes)
        .nest("/api", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let status = state.registry.status().await?;
    let available = status.api_endpoints.iter().filter(|e| e.is_available).count();

    Ok(Json(json!({
        "status": "healthy",
        "current_api": status.current_api_name,
        "available_apis": available,
        "total_apis": status.api_endpoints.len(),
        "download_timeout_secs": state.settings.download.timeout_secs,
        "ban_sweeper_running": state.ban_sweeper.is_running().await,
    })))
}

async fn ping() -> Json<Value> {
    Json(json!({"status": "pong"}))
}
