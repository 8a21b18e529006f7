//! Admin handlers for managing the endpoint pool

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::pool::registry::{EndpointPatch, NewEndpoint, PoolStatus, SettingsPatch};
use crate::AppState;

fn success() -> Json<Value> {
    Json(json!({"status": "success"}))
}

/// `GET /api/config`
pub async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<PoolStatus>> {
    Ok(Json(state.registry.status().await?))
}

/// `POST /api/config`
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Value>> {
    state.registry.update_settings(patch).await?;
    Ok(success())
}

/// `POST /api/endpoints`
pub async fn add_endpoint(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewEndpoint>,
) -> Result<Json<Value>> {
    let endpoint = state.registry.add_endpoint(new).await?;
    Ok(Json(json!({"status": "success", "id": endpoint.id})))
}

/// `PUT /api/endpoints/:id`
pub async fn update_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<EndpointPatch>,
) -> Result<Json<Value>> {
    let endpoint = state.registry.update_endpoint(&id, patch).await?;
    Ok(Json(json!({"status": "success", "id": endpoint.id})))
}

/// `DELETE /api/endpoints/:id`
pub async fn delete_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if state.registry.remove_endpoint(&id).await? {
        Ok(success())
    } else {
        Err(AppError::EndpointNotFound(id))
    }
}

/// `POST /api/endpoints/:id/switch`
pub async fn switch_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if !state.registry.switch_to(&id).await? {
        return Err(AppError::EndpointNotFound(id));
    }
    let current = state.registry.current_endpoint().await?;
    Ok(Json(json!({
        "status": "success",
        "current_api": current.map(|e| e.name),
    })))
}

/// `POST /api/endpoints/:id/unban`
pub async fn unban_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.registry.unban(&id).await?;
    Ok(success())
}

/// `POST /api/endpoints/:id/reset`
pub async fn reset_quota(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.registry.reset_quota(&id).await?;
    Ok(success())
}

/// `POST /api/endpoints/:id/reset-stats`
pub async fn reset_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.registry.reset_stats(&id).await?;
    Ok(success())
}

/// `POST /api/endpoints/reset-all`
pub async fn reset_all_quotas(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    state.registry.reset_all_quotas().await?;
    Ok(success())
}

/// `POST /api/endpoints/unban-all`
pub async fn unban_all(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    state.registry.unban_all().await?;
    Ok(success())
}
