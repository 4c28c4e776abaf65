//! HTTP handlers module

mod devices;
mod settings;
mod sync;

pub use self::devices::*;
pub use self::settings::*;
pub use self::sync::*;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub device_count: usize,
    pub registry_writes: u64,
}

/// Health check handler
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "ecowitt-soil-bridge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        device_count: state.registry.device_count().await,
        registry_writes: state.registry.write_count(),
    })
}

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
