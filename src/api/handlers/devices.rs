//! Device handlers

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::api::ApiState;
use crate::error::AppError;
use crate::registry::DeviceRegistry;

/// GET /api/devices - List registered soil sensors
pub async fn list_devices(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    let devices = state.registry.list_devices().await?;
    Ok(Json(devices))
}

/// GET /api/devices/:id - Get one soil sensor
pub async fn get_device(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let device = state
        .registry
        .get_device(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))?;

    Ok(Json(device))
}
