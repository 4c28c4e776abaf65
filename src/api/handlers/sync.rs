//! Poll scheduler handlers

use axum::{extract::State, response::IntoResponse, Json};

use crate::api::ApiState;
use crate::error::AppError;
use crate::sync::scheduler::CycleOutcome;
use crate::sync::CycleKind;

/// GET /api/sync/status - Scheduler state and last cycle
pub async fn get_sync_status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.scheduler.status().await)
}

/// POST /api/sync - Poll the gateway now
pub async fn trigger_sync(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    match state.scheduler.run_cycle(CycleKind::Manual).await {
        CycleOutcome::Skipped => Err(AppError::Conflict("Sync already in progress".to_string())),
        CycleOutcome::Failed { error } => Err(AppError::Upstream(error)),
        outcome => {
            tracing::info!("[SyncApi] Manual sync finished");
            Ok(Json(outcome))
        }
    }
}
