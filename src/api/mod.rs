//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::registry::MemoryRegistry;
use crate::settings::SettingsStore;
use crate::sync::PollScheduler;

/// State shared by the admin API handlers
#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<SettingsStore>,
    pub registry: Arc<MemoryRegistry>,
    pub scheduler: Arc<PollScheduler>,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(
        settings: Arc<SettingsStore>,
        registry: Arc<MemoryRegistry>,
        scheduler: Arc<PollScheduler>,
    ) -> Self {
        Self {
            settings,
            registry,
            scheduler,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub fn routes() -> Router<ApiState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Settings
        .route("/api/settings", get(handlers::list_settings))
        .route("/api/settings/:key", put(handlers::update_setting))
        // Devices
        .route("/api/devices", get(handlers::list_devices))
        .route("/api/devices/:id", get(handlers::get_device))
        // Polling
        .route("/api/sync", post(handlers::trigger_sync))
        .route("/api/sync/status", get(handlers::get_sync_status))
}
