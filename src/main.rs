//! Ecowitt soil-moisture bridge
//!
//! Polls an Ecowitt gateway for soil-moisture channels and exposes every
//! channel as a logical humidity sensor, with a small admin API for the
//! gateway setting and the device list.

mod api;
mod config;
mod error;
mod gateway;
mod models;
mod registry;
mod settings;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::ApiState;
use crate::gateway::GatewayClient;
use crate::registry::MemoryRegistry;
use crate::settings::SettingsStore;
use crate::sync::{DeviceReconciler, PollScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecowitt_soil_bridge=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Ecowitt Soil Moisture Plugin Loaded");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!("Configuration loaded");

    // An empty settings path keeps the gateway host in memory only
    let settings = if config.settings.path.is_empty() {
        Arc::new(SettingsStore::in_memory(config.gateway.host.trim()))
    } else {
        Arc::new(SettingsStore::load(&config.settings.path, &config.gateway.host).await?)
    };
    if !settings.gateway_config().is_configured() {
        tracing::info!("Please specify your Ecowitt hostname or IP address to continue.");
    }

    let registry = Arc::new(MemoryRegistry::new());

    let client = GatewayClient::new(
        config.gateway.request_timeout(),
        config.gateway.connect_timeout(),
    )?;
    let reconciler = DeviceReconciler::new(registry.clone(), config.gateway.retain_stale);
    let scheduler = Arc::new(PollScheduler::new(
        client,
        reconciler,
        settings.clone(),
        config.gateway.poll_interval(),
    ));

    let poller = scheduler.clone().spawn();
    tracing::info!("Background polling started");

    // Build application router
    let state = ApiState::new(settings, registry, scheduler);
    let app = api::routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
