//! Settings handlers

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::ApiState;
use crate::error::AppError;

use super::SuccessResponse;

/// GET /api/settings - List plugin settings
pub async fn list_settings(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.settings.get_settings().await)
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: Option<String>,
}

/// PUT /api/settings/:key - Update a setting
///
/// Changing `ecowitt-host` makes the poll scheduler resync devices right away.
pub async fn update_setting(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSettingRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .settings
        .put_setting(&key, payload.value.as_deref())
        .await?;

    Ok(Json(SuccessResponse::new("Setting updated")))
}
